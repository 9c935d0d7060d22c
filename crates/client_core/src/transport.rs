//! Collaborator contracts consumed by the terminal and their HTTP implementation.

use std::{future::Future, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header::CACHE_CONTROL, Client, RequestBuilder, Response, StatusCode};
use shared::{
    domain::{EmitterId, OperatorId, OperatorIdentity},
    error::ApiError,
    protocol::{
        CreateUserRequest, LoginRequest, PrinterStatusResponse, UpdateUserRequest, UserRecord,
        HEALTH_ROUTE, LOGIN_ROUTE, PRINTER_STATUS_ROUTE, USERS_ROUTE,
    },
};
use url::Url;

#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Any error means the credentials were not accepted.
    async fn authenticate(&self, username: &str, password: &str) -> Result<OperatorIdentity>;
    async fn server_health(&self) -> Result<()>;
    async fn printer_status(&self, emitter_id: EmitterId) -> Result<PrinterStatusResponse>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_users(&self, emitter_id: Option<EmitterId>) -> Result<Vec<UserRecord>>;
    async fn create_user(&self, request: &CreateUserRequest) -> Result<UserRecord>;
    async fn update_user(
        &self,
        user_id: OperatorId,
        request: &UpdateUserRequest,
    ) -> Result<UserRecord>;
    async fn delete_user(&self, user_id: OperatorId) -> Result<()>;
}

pub struct MissingUserDirectory;

#[async_trait]
impl UserDirectory for MissingUserDirectory {
    async fn list_users(&self, _emitter_id: Option<EmitterId>) -> Result<Vec<UserRecord>> {
        Err(anyhow!("user directory is unavailable"))
    }

    async fn create_user(&self, _request: &CreateUserRequest) -> Result<UserRecord> {
        Err(anyhow!("user directory is unavailable"))
    }

    async fn update_user(
        &self,
        _user_id: OperatorId,
        _request: &UpdateUserRequest,
    ) -> Result<UserRecord> {
        Err(anyhow!("user directory is unavailable"))
    }

    async fn delete_user(&self, _user_id: OperatorId) -> Result<()> {
        Err(anyhow!("user directory is unavailable"))
    }
}

/// reqwest-backed client for the receipt backend.
pub struct HttpBackend {
    http: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(server_url: &str, request_timeout: Duration) -> Result<Self> {
        let mut base_url =
            Url::parse(server_url).with_context(|| format!("invalid server url '{server_url}'"))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, route: &str) -> Result<Url> {
        self.base_url
            .join(route.trim_start_matches('/'))
            .with_context(|| format!("invalid route '{route}'"))
    }

    fn get(&self, route: &str) -> Result<RequestBuilder> {
        Ok(self
            .http
            .get(self.endpoint(route)?)
            .header(CACHE_CONTROL, "no-store"))
    }
}

/// Applies `limit` to a collaborator call; expiry counts as a failure.
pub(crate) async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!("request timed out after {} ms", limit.as_millis())),
    }
}

/// Turns a non-success response into an error carrying the server's message.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = match response.json::<ApiError>().await {
        Ok(api_error) => api_error.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string(),
    };
    Err(anyhow!("server responded {status}: {detail}"))
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn authenticate(&self, username: &str, password: &str) -> Result<OperatorIdentity> {
        let response = self
            .http
            .post(self.endpoint(LOGIN_ROUTE)?)
            .header(CACHE_CONTROL, "no-store")
            .json(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(anyhow!("credentials rejected"));
        }
        let identity = ensure_success(response)
            .await?
            .json::<OperatorIdentity>()
            .await
            .context("malformed login response")?;
        Ok(identity)
    }

    async fn server_health(&self) -> Result<()> {
        self.get(HEALTH_ROUTE)?
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn printer_status(&self, emitter_id: EmitterId) -> Result<PrinterStatusResponse> {
        let status = self
            .get(PRINTER_STATUS_ROUTE)?
            .query(&[("emittente_id", emitter_id.0)])
            .send()
            .await?
            .error_for_status()?
            .json::<PrinterStatusResponse>()
            .await
            .context("malformed printer status response")?;
        Ok(status)
    }
}

#[async_trait]
impl UserDirectory for HttpBackend {
    async fn list_users(&self, emitter_id: Option<EmitterId>) -> Result<Vec<UserRecord>> {
        let mut request = self.get(USERS_ROUTE)?;
        if let Some(emitter_id) = emitter_id {
            request = request.query(&[("emittente_id", emitter_id.0)]);
        }
        let users = ensure_success(request.send().await?)
            .await?
            .json()
            .await
            .context("malformed user list")?;
        Ok(users)
    }

    async fn create_user(&self, request: &CreateUserRequest) -> Result<UserRecord> {
        let response = self
            .http
            .post(self.endpoint(USERS_ROUTE)?)
            .json(request)
            .send()
            .await?;
        let user = ensure_success(response)
            .await?
            .json()
            .await
            .context("malformed user record")?;
        Ok(user)
    }

    async fn update_user(
        &self,
        user_id: OperatorId,
        request: &UpdateUserRequest,
    ) -> Result<UserRecord> {
        let response = self
            .http
            .put(self.endpoint(&format!("{USERS_ROUTE}/{}", user_id.0))?)
            .json(request)
            .send()
            .await?;
        let user = ensure_success(response)
            .await?
            .json()
            .await
            .context("malformed user record")?;
        Ok(user)
    }

    async fn delete_user(&self, user_id: OperatorId) -> Result<()> {
        let response = self
            .http
            .delete(self.endpoint(&format!("{USERS_ROUTE}/{}", user_id.0))?)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
