//! Background health polling of the application server and the receipt printer.
//!
//! The monitor runs only while a session is active. Each activation gets a
//! fresh [`ActivationToken`]; every check captures the token current when it
//! was issued and its result is written only if that token is still current
//! when the response arrives. Deactivation bumps the token under the same lock,
//! so responses that outlive their session are dropped instead of applied.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex as StdMutex, PoisonError,
    },
    time::Duration,
};

use shared::domain::{EmitterId, HealthStatus, MonitoredService, OperatorIdentity};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    config::PollIntervals,
    transport::{bounded, BackendApi},
    ClientEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthSnapshot {
    pub server: HealthStatus,
    pub printer: HealthStatus,
}

impl HealthSnapshot {
    pub fn get(&self, service: MonitoredService) -> HealthStatus {
        match service {
            MonitoredService::Server => self.server,
            MonitoredService::Printer => self.printer,
        }
    }

    fn slot_mut(&mut self, service: MonitoredService) -> &mut HealthStatus {
        match service {
            MonitoredService::Server => &mut self.server,
            MonitoredService::Printer => &mut self.printer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActivationToken(u64);

impl ActivationToken {
    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

#[derive(Debug, Clone, Copy)]
enum Probe {
    Server,
    Printer(EmitterId),
}

impl Probe {
    fn service(self) -> MonitoredService {
        match self {
            Probe::Server => MonitoredService::Server,
            Probe::Printer(_) => MonitoredService::Printer,
        }
    }
}

#[derive(Default)]
struct MonitorState {
    token: ActivationToken,
    active: bool,
    health: HealthSnapshot,
}

pub struct LivenessMonitor {
    backend: Arc<dyn BackendApi>,
    intervals: PollIntervals,
    request_timeout: Duration,
    events: broadcast::Sender<ClientEvent>,
    state: Mutex<MonitorState>,
    /// Kept outside `state` so they can be aborted from `Drop`.
    pollers: StdMutex<Vec<JoinHandle<()>>>,
    discarded: AtomicU64,
}

impl LivenessMonitor {
    pub fn new(
        backend: Arc<dyn BackendApi>,
        intervals: PollIntervals,
        request_timeout: Duration,
        events: broadcast::Sender<ClientEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            backend,
            intervals,
            request_timeout,
            events,
            state: Mutex::new(MonitorState::default()),
            pollers: StdMutex::new(Vec::new()),
            discarded: AtomicU64::new(0),
        })
    }

    pub async fn health(&self) -> HealthSnapshot {
        self.state.lock().await.health
    }

    pub async fn is_active(&self) -> bool {
        self.state.lock().await.active
    }

    /// Number of check results dropped because their session had ended.
    pub fn discarded_results(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Starts polling for `operator`'s session. Both services are checked
    /// immediately, then on their own periods. Returns `None` if already active.
    pub async fn activate(self: &Arc<Self>, operator: &OperatorIdentity) -> Option<ActivationToken> {
        let mut guard = self.state.lock().await;
        if guard.active {
            return None;
        }

        guard.token = guard.token.next();
        guard.active = true;
        guard.health = HealthSnapshot::default();
        let token = guard.token;

        let mut pollers = vec![self.spawn_poller(token, Probe::Server, self.intervals.server)];
        match operator.emitter_id {
            Some(emitter_id) => pollers.push(self.spawn_poller(
                token,
                Probe::Printer(emitter_id),
                self.intervals.printer,
            )),
            None => debug!(
                operator = %operator.username,
                "no emitter associated with operator; printer status stays unknown"
            ),
        }
        self.pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(pollers);

        info!(
            operator = %operator.username,
            emitter_id = operator.emitter_id.map(|id| id.0),
            server_every_ms = self.intervals.server.as_millis() as u64,
            printer_every_ms = self.intervals.printer.as_millis() as u64,
            "liveness monitor activated"
        );
        Some(token)
    }

    /// Cancels future checks and resets both statuses to `Unknown`. Checks
    /// already in flight finish but their results are discarded.
    pub async fn deactivate(&self) {
        let previous = {
            let mut guard = self.state.lock().await;
            if guard.active {
                info!("liveness monitor deactivated");
            }
            guard.active = false;
            guard.token = guard.token.next();
            self.abort_pollers();
            std::mem::take(&mut guard.health)
        };

        for service in [MonitoredService::Server, MonitoredService::Printer] {
            if previous.get(service).is_known() {
                let _ = self.events.send(ClientEvent::HealthChanged {
                    service,
                    status: HealthStatus::Unknown,
                });
            }
        }
    }

    /// Stops the pollers without waiting; used when the owner is dropped.
    /// The pollers are aborted even while the state lock is held elsewhere.
    pub(crate) fn shutdown_now(&self) {
        self.abort_pollers();
        if let Ok(mut guard) = self.state.try_lock() {
            guard.active = false;
            guard.token = guard.token.next();
        }
    }

    fn abort_pollers(&self) {
        let pollers = std::mem::take(
            &mut *self.pollers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for poller in pollers {
            poller.abort();
        }
    }

    /// Probes the server. Never fails: any error becomes `Unhealthy`.
    pub async fn check_server(&self) -> HealthStatus {
        match bounded(self.request_timeout, self.backend.server_health()).await {
            Ok(()) => HealthStatus::Healthy,
            Err(error) => {
                warn!(%error, "server health check failed");
                HealthStatus::Unhealthy
            }
        }
    }

    /// Probes the printer of `emitter_id`. Without an emitter nothing is
    /// requested and the status is `Unknown`; any failure is `Unhealthy`.
    pub async fn check_printer(&self, emitter_id: Option<EmitterId>) -> HealthStatus {
        let Some(emitter_id) = emitter_id else {
            return HealthStatus::Unknown;
        };
        match bounded(self.request_timeout, self.backend.printer_status(emitter_id)).await {
            Ok(status) => {
                debug!(emitter_id = emitter_id.0, host = %status.host, online = status.online, "printer status");
                HealthStatus::from_ok(status.online)
            }
            Err(error) => {
                warn!(emitter_id = emitter_id.0, %error, "printer status check failed");
                HealthStatus::Unhealthy
            }
        }
    }

    fn spawn_poller(self: &Arc<Self>, token: ActivationToken, probe: Probe, period: Duration) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately.
                ticker.tick().await;
                let monitor = Arc::clone(&monitor);
                // Detached so a slow response never holds back the next tick.
                tokio::spawn(async move {
                    let status = match probe {
                        Probe::Server => monitor.check_server().await,
                        Probe::Printer(emitter_id) => monitor.check_printer(Some(emitter_id)).await,
                    };
                    monitor.apply(token, probe.service(), status).await;
                });
            }
        })
    }

    async fn apply(&self, token: ActivationToken, service: MonitoredService, status: HealthStatus) -> bool {
        let mut guard = self.state.lock().await;
        if !guard.active || guard.token != token {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            debug!(%service, ?status, "discarding check result from an ended session");
            return false;
        }

        let slot = guard.health.slot_mut(service);
        if *slot != status {
            info!(%service, from = ?*slot, to = ?status, "health status changed");
            *slot = status;
            let _ = self.events.send(ClientEvent::HealthChanged { service, status });
        }
        true
    }
}

#[cfg(test)]
#[path = "tests/liveness_tests.rs"]
mod tests;
