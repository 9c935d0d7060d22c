use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use shared::{
    domain::{EmitterId, OperatorId, OperatorIdentity},
    error::{ApiError, ErrorCode},
    protocol::{
        CreateUserRequest, HealthResponse, LoginRequest, PrinterStatusQuery,
        PrinterStatusResponse, UpdateUserRequest, UserListQuery, UserRecord, HEALTH_ROUTE,
        LOGIN_ROUTE, PRINTER_STATUS_ROUTE, USERS_ROUTE,
    },
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod printer;

use api::ApiContext;
use config::{load_settings, prepare_database_url};

const MAX_BODY_BYTES: usize = 64 * 1024;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext {
        storage,
        printer_probe_timeout: settings.printer_probe_timeout(),
    };
    let app = build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let user_route = format!("{USERS_ROUTE}/:user_id");
    Router::new()
        .route(HEALTH_ROUTE, get(health))
        .route(LOGIN_ROUTE, post(login))
        .route(PRINTER_STATUS_ROUTE, get(printer_status))
        .route(USERS_ROUTE, get(list_users).post(create_user))
        .route(&user_route, put(update_user).delete(delete_user))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

fn reject(error: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match error.code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(detail = %error.message, "request failed");
    }
    (status, Json(error))
}

async fn health(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    api::health(&state.api).await.map_err(reject)?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<OperatorIdentity>> {
    let identity = api::login(&state.api, &req).await.map_err(reject)?;
    Ok(Json(identity))
}

async fn printer_status(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PrinterStatusQuery>,
) -> ApiResult<Json<PrinterStatusResponse>> {
    let status = api::printer_status(&state.api, EmitterId(q.emitter_id))
        .await
        .map_err(reject)?;
    Ok(Json(status))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserListQuery>,
) -> ApiResult<Json<Vec<UserRecord>>> {
    let users = api::list_users(&state.api, q.emitter_id.map(EmitterId))
        .await
        .map_err(reject)?;
    Ok(Json(users))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserRecord>)> {
    let user = api::create_user(&state.api, req).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserRecord>> {
    let user = api::update_user(&state.api, OperatorId(user_id), req)
        .await
        .map_err(reject)?;
    Ok(Json(user))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> ApiResult<StatusCode> {
    api::delete_user(&state.api, OperatorId(user_id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
