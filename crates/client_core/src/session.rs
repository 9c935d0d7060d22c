//! Session store: the single source of truth for who is signed in.

use shared::domain::OperatorIdentity;
use tokio::sync::RwLock;
use zeroize::Zeroize;

/// Snapshot of the session. The identity is present exactly when a session
/// is active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    identity: Option<OperatorIdentity>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn identity(&self) -> Option<&OperatorIdentity> {
        self.identity.as_ref()
    }
}

#[derive(Default)]
pub struct SessionStore {
    state: RwLock<SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated()
    }

    pub async fn current(&self) -> Option<OperatorIdentity> {
        self.state.read().await.identity.clone()
    }

    /// Commits a new session. Returns `false` and leaves the store untouched
    /// if a session is already active.
    pub(crate) async fn begin(&self, identity: OperatorIdentity) -> bool {
        let mut guard = self.state.write().await;
        if guard.identity.is_some() {
            return false;
        }
        guard.identity = Some(identity);
        true
    }

    /// Clears the session. Returns whether one was active.
    pub(crate) async fn end(&self) -> bool {
        self.state.write().await.identity.take().is_some()
    }
}

/// Credentials typed by the operator before submission.
#[derive(Default)]
pub struct LoginForm {
    username: String,
    password: String,
}

impl LoginForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password.zeroize();
        self.password = password.into();
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }

    pub fn clear(&mut self) {
        self.username.clear();
        self.password.zeroize();
    }
}

impl Drop for LoginForm {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}
