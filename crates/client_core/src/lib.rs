use std::sync::Arc;

use anyhow::Result;
use shared::{
    domain::{EmitterId, HealthStatus, MonitoredService, OperatorId, OperatorIdentity},
    protocol::{CreateUserRequest, UpdateUserRequest, UserRecord},
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

pub mod clock;
pub mod config;
pub mod error;
pub mod liveness;
pub mod navigation;
pub mod session;
pub mod transport;

pub use config::{ClientSettings, PollIntervals};
pub use error::{AccessError, AuthError, UserAdminError};
pub use liveness::{HealthSnapshot, LivenessMonitor};
pub use navigation::{Area, NavigationController, NavigationState, SettingsEntry, SettingsView};
pub use session::{LoginForm, SessionState, SessionStore};
pub use transport::{BackendApi, HttpBackend, MissingUserDirectory, UserDirectory};

use transport::bounded;

#[derive(Debug, Clone)]
pub enum ClientEvent {
    SessionStarted(OperatorIdentity),
    SessionEnded,
    HealthChanged {
        service: MonitoredService,
        status: HealthStatus,
    },
    NavigationChanged(NavigationState),
    ClockTick(String),
    /// User-visible denial (rejected login, refused navigation).
    Denied(String),
}

/// Owns the session, health and navigation state of one terminal and drives
/// the transitions between them.
pub struct TerminalClient {
    settings: ClientSettings,
    backend: Arc<dyn BackendApi>,
    users: Arc<dyn UserDirectory>,
    session: SessionStore,
    monitor: Arc<LivenessMonitor>,
    navigation: Mutex<NavigationController>,
    transition: Mutex<()>,
    events: broadcast::Sender<ClientEvent>,
}

impl TerminalClient {
    pub fn new(settings: ClientSettings, backend: Arc<dyn BackendApi>) -> Arc<Self> {
        Self::new_with_dependencies(settings, backend, Arc::new(MissingUserDirectory))
    }

    pub fn new_with_dependencies(
        settings: ClientSettings,
        backend: Arc<dyn BackendApi>,
        users: Arc<dyn UserDirectory>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        let monitor = LivenessMonitor::new(
            Arc::clone(&backend),
            settings.poll,
            settings.request_timeout,
            events.clone(),
        );
        Arc::new(Self {
            settings,
            backend,
            users,
            session: SessionStore::new(),
            monitor,
            navigation: Mutex::new(NavigationController::new()),
            transition: Mutex::new(()),
            events,
        })
    }

    /// Client talking HTTP to `settings.server_url` for every collaborator.
    pub fn connect(settings: ClientSettings) -> Result<Arc<Self>> {
        let http = Arc::new(HttpBackend::new(
            &settings.server_url,
            settings.request_timeout,
        )?);
        Ok(Self::new_with_dependencies(settings, http.clone(), http))
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn monitor(&self) -> &Arc<LivenessMonitor> {
        &self.monitor
    }

    pub async fn session(&self) -> SessionState {
        self.session.snapshot().await
    }

    pub async fn health(&self) -> HealthSnapshot {
        self.monitor.health().await
    }

    pub async fn navigation(&self) -> NavigationState {
        self.navigation.lock().await.state()
    }

    pub fn spawn_clock(&self) -> JoinHandle<()> {
        clock::spawn_clock(self.events.clone(), self.settings.clock_interval)
    }

    /// Authenticates and starts a session. Blank input is refused locally
    /// without contacting the backend; a rejection leaves the session as it was.
    pub async fn login(&self, username: &str, password: &str) -> Result<OperatorIdentity, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.trim().is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        if self.session.is_authenticated().await {
            return Err(AuthError::AlreadyAuthenticated);
        }

        let identity = match bounded(
            self.settings.request_timeout,
            self.backend.authenticate(username, password),
        )
        .await
        {
            Ok(identity) => identity,
            Err(error) => {
                warn!(%username, %error, "login rejected");
                self.deny(AuthError::InvalidCredentials.to_string());
                return Err(AuthError::InvalidCredentials);
            }
        };

        let _transition = self.transition.lock().await;
        if !self.session.begin(identity.clone()).await {
            return Err(AuthError::AlreadyAuthenticated);
        }
        self.navigation.lock().await.reset();
        self.monitor.activate(&identity).await;

        info!(
            operator_id = identity.id.0,
            operator = %identity.username,
            role = identity.role.as_deref().unwrap_or_default(),
            "operator signed in"
        );
        let _ = self.events.send(ClientEvent::SessionStarted(identity.clone()));
        let _ = self
            .events
            .send(ClientEvent::NavigationChanged(NavigationState::default()));
        Ok(identity)
    }

    /// Submits `form`, wiping it once the session has started.
    pub async fn submit_login(&self, form: &mut LoginForm) -> Result<OperatorIdentity, AuthError> {
        let identity = self.login(form.username(), form.password()).await?;
        form.clear();
        Ok(identity)
    }

    /// Ends the session. Safe to call when nobody is signed in.
    pub async fn logout(&self) {
        let _transition = self.transition.lock().await;
        // Health goes back to Unknown before the session is dropped, so no
        // reader ever sees a signed-out terminal with a known status.
        self.monitor.deactivate().await;
        let ended = self.session.end().await;
        self.navigation.lock().await.reset();

        if ended {
            info!("operator signed out");
            let _ = self.events.send(ClientEvent::SessionEnded);
            let _ = self
                .events
                .send(ClientEvent::NavigationChanged(NavigationState::default()));
        }
    }

    pub async fn select_area(&self, area: Area) -> Result<(), AccessError> {
        self.require_operator().await?;
        let mut navigation = self.navigation.lock().await;
        if navigation.select_area(area) {
            self.emit_navigation(navigation.state());
        }
        Ok(())
    }

    /// Activates a settings grid entry; only `Users` has an effect here.
    pub async fn activate_entry(&self, entry: SettingsEntry) -> Result<(), AccessError> {
        let operator = self.require_operator().await?;
        let mut navigation = self.navigation.lock().await;
        match navigation.activate_entry(entry, &operator) {
            Ok(true) => {
                self.emit_navigation(navigation.state());
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(error) => Err(self.refuse(&operator, error)),
        }
    }

    pub async fn open_user_management(&self) -> Result<(), AccessError> {
        let operator = self.require_operator().await?;
        let mut navigation = self.navigation.lock().await;
        match navigation.open_user_management(&operator) {
            Ok(true) => {
                self.emit_navigation(navigation.state());
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(error) => Err(self.refuse(&operator, error)),
        }
    }

    /// Leaves user management for the settings grid.
    pub async fn back(&self) {
        let mut navigation = self.navigation.lock().await;
        if navigation.back() {
            self.emit_navigation(navigation.state());
        }
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>, UserAdminError> {
        let emitter_id = self.admin_emitter().await?;
        bounded(
            self.settings.request_timeout,
            self.users.list_users(Some(emitter_id)),
        )
        .await
        .map_err(request_failed)
    }

    /// Creates a user; the emitter defaults to the current operator's.
    pub async fn create_user(
        &self,
        mut request: CreateUserRequest,
    ) -> Result<UserRecord, UserAdminError> {
        let emitter_id = self.admin_emitter().await?;
        request.username = request.username.trim().to_string();
        request.emitter_id.get_or_insert(emitter_id);
        let created = bounded(self.settings.request_timeout, self.users.create_user(&request))
            .await
            .map_err(request_failed)?;
        info!(user_id = created.id.0, username = %created.username, "user created");
        Ok(created)
    }

    pub async fn update_user(
        &self,
        user_id: OperatorId,
        request: UpdateUserRequest,
    ) -> Result<UserRecord, UserAdminError> {
        self.admin_emitter().await?;
        let updated = bounded(
            self.settings.request_timeout,
            self.users.update_user(user_id, &request),
        )
        .await
        .map_err(request_failed)?;
        info!(user_id = user_id.0, "user updated");
        Ok(updated)
    }

    pub async fn delete_user(&self, user_id: OperatorId) -> Result<(), UserAdminError> {
        self.admin_emitter().await?;
        bounded(self.settings.request_timeout, self.users.delete_user(user_id))
            .await
            .map_err(request_failed)?;
        info!(user_id = user_id.0, "user deleted");
        Ok(())
    }

    async fn require_operator(&self) -> Result<OperatorIdentity, AccessError> {
        self.session
            .current()
            .await
            .ok_or(AccessError::NotAuthenticated)
    }

    async fn admin_emitter(&self) -> Result<EmitterId, AccessError> {
        let operator = self.require_operator().await?;
        if !operator.is_admin() {
            return Err(self.refuse(&operator, AccessError::AuthorizationDenied));
        }
        operator.emitter_id.ok_or(AccessError::MissingIssuerContext)
    }

    fn refuse(&self, operator: &OperatorIdentity, error: AccessError) -> AccessError {
        warn!(operator = %operator.username, %error, "navigation refused");
        self.deny(error.to_string());
        error
    }

    fn deny(&self, message: String) {
        let _ = self.events.send(ClientEvent::Denied(message));
    }

    fn emit_navigation(&self, state: NavigationState) {
        let _ = self.events.send(ClientEvent::NavigationChanged(state));
    }
}

impl Drop for TerminalClient {
    fn drop(&mut self) {
        self.monitor.shutdown_now();
    }
}

fn request_failed(error: anyhow::Error) -> UserAdminError {
    UserAdminError::Request(format!("{error:#}"))
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
