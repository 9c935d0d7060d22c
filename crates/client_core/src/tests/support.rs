use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex as StdMutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{EmitterId, OperatorId, OperatorIdentity},
    protocol::{CreateUserRequest, PrinterStatusResponse, UpdateUserRequest, UserRecord},
};
use tokio::sync::watch;

use crate::{config::PollIntervals, transport::BackendApi, transport::UserDirectory, ClientSettings};

pub(crate) fn operator(role: Option<&str>, emitter_id: Option<i64>) -> OperatorIdentity {
    OperatorIdentity {
        id: OperatorId(11),
        username: "alice".to_string(),
        given_name: Some("Alice".to_string()),
        family_name: Some("Verdi".to_string()),
        role: role.map(str::to_string),
        emitter_id: emitter_id.map(EmitterId),
    }
}

/// Intervals long enough that only the immediate checks run during a test.
pub(crate) fn settings_immediate_only() -> ClientSettings {
    ClientSettings {
        request_timeout: Duration::from_secs(5),
        poll: PollIntervals {
            server: Duration::from_secs(3600),
            printer: Duration::from_secs(3600),
        },
        ..ClientSettings::default()
    }
}

pub(crate) fn settings_fast_polling() -> ClientSettings {
    ClientSettings {
        request_timeout: Duration::from_secs(5),
        poll: PollIntervals {
            server: Duration::from_millis(20),
            printer: Duration::from_millis(30),
        },
        ..ClientSettings::default()
    }
}

/// Polls `condition` until it holds, panicking after two seconds.
pub(crate) async fn wait_until<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Scriptable collaborator. Liveness responses can be held at a gate to
/// simulate checks that are still in flight.
pub(crate) struct FakeBackend {
    pub(crate) login_result: StdMutex<Option<OperatorIdentity>>,
    pub(crate) login_calls: StdMutex<Vec<(String, String)>>,
    pub(crate) server_ok: AtomicBool,
    pub(crate) server_calls: AtomicUsize,
    /// `None` answers with an error, as a malformed or failed response would.
    pub(crate) printer_online: StdMutex<Option<bool>>,
    pub(crate) printer_calls: StdMutex<Vec<EmitterId>>,
    pub(crate) held: AtomicUsize,
    gate: watch::Sender<bool>,
}

impl FakeBackend {
    pub(crate) fn accepting(identity: OperatorIdentity) -> Arc<Self> {
        let (gate, _) = watch::channel(true);
        Arc::new(Self {
            login_result: StdMutex::new(Some(identity)),
            login_calls: StdMutex::new(Vec::new()),
            server_ok: AtomicBool::new(true),
            server_calls: AtomicUsize::new(0),
            printer_online: StdMutex::new(Some(true)),
            printer_calls: StdMutex::new(Vec::new()),
            held: AtomicUsize::new(0),
            gate,
        })
    }

    pub(crate) fn rejecting() -> Arc<Self> {
        let backend = Self::accepting(operator(None, None));
        *backend.login_result.lock().expect("lock") = None;
        backend
    }

    pub(crate) fn login_call_count(&self) -> usize {
        self.login_calls.lock().expect("lock").len()
    }

    pub(crate) fn printer_call_ids(&self) -> Vec<EmitterId> {
        self.printer_calls.lock().expect("lock").clone()
    }

    pub(crate) fn set_printer_online(&self, online: Option<bool>) {
        *self.printer_online.lock().expect("lock") = online;
    }

    pub(crate) fn hold_responses(&self) {
        self.gate.send_replace(false);
    }

    pub(crate) fn release_responses(&self) {
        self.gate.send_replace(true);
    }

    async fn pass_gate(&self) {
        let mut open = self.gate.subscribe();
        let already_open = *open.borrow();
        if already_open {
            return;
        }
        self.held.fetch_add(1, Ordering::SeqCst);
        let _ = open.wait_for(|open| *open).await;
        self.held.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BackendApi for FakeBackend {
    async fn authenticate(&self, username: &str, password: &str) -> Result<OperatorIdentity> {
        self.login_calls
            .lock()
            .expect("lock")
            .push((username.to_string(), password.to_string()));
        self.login_result
            .lock()
            .expect("lock")
            .clone()
            .ok_or_else(|| anyhow!("401 unauthorized"))
    }

    async fn server_health(&self) -> Result<()> {
        self.server_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        if self.server_ok.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(anyhow!("connection refused"))
        }
    }

    async fn printer_status(&self, emitter_id: EmitterId) -> Result<PrinterStatusResponse> {
        self.printer_calls.lock().expect("lock").push(emitter_id);
        self.pass_gate().await;
        let online = *self.printer_online.lock().expect("lock");
        online
            .map(|online| PrinterStatusResponse {
                host: "10.0.0.9".to_string(),
                port: 9100,
                online,
            })
            .ok_or_else(|| anyhow!("malformed printer status"))
    }
}

/// In-memory user directory recording what the terminal asked for.
#[derive(Default)]
pub(crate) struct FakeDirectory {
    pub(crate) listed_for: StdMutex<Vec<Option<EmitterId>>>,
    pub(crate) created: StdMutex<Vec<CreateUserRequest>>,
    pub(crate) deleted: StdMutex<Vec<OperatorId>>,
    pub(crate) fail: AtomicBool,
}

impl FakeDirectory {
    fn record(request: &CreateUserRequest, id: i64) -> UserRecord {
        let now = chrono::Utc::now();
        UserRecord {
            id: OperatorId(id),
            username: request.username.clone(),
            given_name: request.given_name.clone(),
            family_name: request.family_name.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            role: request.role.clone(),
            emitter_id: request.emitter_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("server responded 500 Internal Server Error"));
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn list_users(&self, emitter_id: Option<EmitterId>) -> Result<Vec<UserRecord>> {
        self.listed_for.lock().expect("lock").push(emitter_id);
        self.check()?;
        let created = self.created.lock().expect("lock").clone();
        Ok(created
            .iter()
            .enumerate()
            .map(|(i, request)| Self::record(request, i as i64 + 100))
            .collect())
    }

    async fn create_user(&self, request: &CreateUserRequest) -> Result<UserRecord> {
        self.check()?;
        let mut created = self.created.lock().expect("lock");
        created.push(request.clone());
        Ok(Self::record(request, created.len() as i64 + 99))
    }

    async fn update_user(
        &self,
        user_id: OperatorId,
        request: &UpdateUserRequest,
    ) -> Result<UserRecord> {
        self.check()?;
        let mut record = Self::record(&CreateUserRequest::default(), user_id.0);
        record.role = request.role.clone();
        Ok(record)
    }

    async fn delete_user(&self, user_id: OperatorId) -> Result<()> {
        self.check()?;
        self.deleted.lock().expect("lock").push(user_id);
        Ok(())
    }
}
