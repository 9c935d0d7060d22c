use std::time::Duration;

use shared::{
    domain::{EmitterId, OperatorId, OperatorIdentity, DEFAULT_ROLE},
    error::{ApiError, ErrorCode},
    protocol::{
        CreateUserRequest, LoginRequest, PrinterStatusResponse, UpdateUserRequest, UserRecord,
    },
};
use storage::Storage;
use tracing::{info, warn};

use crate::printer;

const MIN_USERNAME_CHARS: usize = 3;
const MIN_PASSWORD_CHARS: usize = 4;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub printer_probe_timeout: Duration,
}

pub async fn login(ctx: &ApiContext, request: &LoginRequest) -> Result<OperatorIdentity, ApiError> {
    let identity = ctx
        .storage
        .verify_login(&request.username, &request.password)
        .await
        .map_err(internal)?;
    match identity {
        Some(identity) => {
            info!(operator_id = identity.id.0, username = %identity.username, "login accepted");
            Ok(identity)
        }
        None => {
            warn!(username = %request.username, "login rejected");
            Err(ApiError::unauthorized("invalid credentials"))
        }
    }
}

pub async fn health(ctx: &ApiContext) -> Result<(), ApiError> {
    ctx.storage.health_check().await.map_err(internal)
}

pub async fn printer_status(
    ctx: &ApiContext,
    emitter_id: EmitterId,
) -> Result<PrinterStatusResponse, ApiError> {
    let endpoint = ctx
        .storage
        .printer_endpoint(emitter_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("emitter not found"))?;
    let online = printer::probe(&endpoint.host, endpoint.port, ctx.printer_probe_timeout).await;
    Ok(PrinterStatusResponse {
        host: endpoint.host,
        port: endpoint.port,
        online,
    })
}

pub async fn list_users(
    ctx: &ApiContext,
    emitter_id: Option<EmitterId>,
) -> Result<Vec<UserRecord>, ApiError> {
    ctx.storage.list_users(emitter_id).await.map_err(internal)
}

/// Validates and inserts a new operator. The username is stored trimmed and
/// the role defaults to the plain user role.
pub async fn create_user(
    ctx: &ApiContext,
    mut request: CreateUserRequest,
) -> Result<UserRecord, ApiError> {
    request.username = request.username.trim().to_string();
    if request.username.chars().count() < MIN_USERNAME_CHARS {
        return Err(ApiError::validation(format!(
            "username must be at least {MIN_USERNAME_CHARS} characters"
        )));
    }
    if request.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::validation(format!(
            "password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    if request.role.is_none() {
        request.role = Some(DEFAULT_ROLE.to_string());
    }

    if ctx
        .storage
        .username_exists(&request.username)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::new(ErrorCode::Conflict, "username already exists"));
    }

    let created = ctx.storage.create_user(&request).await.map_err(internal)?;
    info!(user_id = created.id.0, username = %created.username, "user created");
    Ok(created)
}

/// Applies the supplied fields. An empty password leaves the current one.
pub async fn update_user(
    ctx: &ApiContext,
    user_id: OperatorId,
    mut request: UpdateUserRequest,
) -> Result<UserRecord, ApiError> {
    if request.password.as_deref().is_some_and(str::is_empty) {
        request.password = None;
    }
    let updated = ctx
        .storage
        .update_user(user_id, &request)
        .await
        .map_err(internal)?
        .ok_or_else(user_not_found)?;
    info!(user_id = user_id.0, "user updated");
    Ok(updated)
}

pub async fn delete_user(ctx: &ApiContext, user_id: OperatorId) -> Result<(), ApiError> {
    if !ctx.storage.delete_user(user_id).await.map_err(internal)? {
        return Err(user_not_found());
    }
    info!(user_id = user_id.0, "user deleted");
    Ok(())
}

fn user_not_found() -> ApiError {
    ApiError::not_found("user not found")
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("{err:#}"))
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
