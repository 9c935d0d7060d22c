use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

/// Polling cadence of the liveness monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub server: Duration,
    pub printer: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            server: Duration::from_secs(10),
            printer: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub request_timeout: Duration,
    pub poll: PollIntervals,
    pub clock_interval: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            request_timeout: Duration::from_secs(5),
            poll: PollIntervals::default(),
            clock_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    request_timeout_ms: Option<u64>,
    server_poll_ms: Option<u64>,
    printer_poll_ms: Option<u64>,
    clock_ms: Option<u64>,
}

/// Defaults, then `path` (if readable), then `TERMINAL__*` environment variables.
pub fn load_settings(path: &Path) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, file_cfg),
            Err(error) => warn!(path = %path.display(), %error, "ignoring malformed settings file"),
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut ClientSettings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.request_timeout_ms.filter(|ms| *ms > 0) {
        settings.request_timeout = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.server_poll_ms.filter(|ms| *ms > 0) {
        settings.poll.server = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.printer_poll_ms.filter(|ms| *ms > 0) {
        settings.poll.printer = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.clock_ms.filter(|ms| *ms > 0) {
        settings.clock_interval = Duration::from_millis(v);
    }
}

fn apply_env(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("TERMINAL__SERVER_URL") {
        settings.server_url = v;
    }

    let millis = |key: &str| -> Option<Duration> {
        let raw = lookup(key)?;
        match raw.parse::<u64>() {
            Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
            _ => {
                warn!(key, value = %raw, "ignoring invalid duration override");
                None
            }
        }
    };

    if let Some(v) = millis("TERMINAL__REQUEST_TIMEOUT_MS") {
        settings.request_timeout = v;
    }
    if let Some(v) = millis("TERMINAL__SERVER_POLL_MS") {
        settings.poll.server = v;
    }
    if let Some(v) = millis("TERMINAL__PRINTER_POLL_MS") {
        settings.poll.printer = v;
    }
    if let Some(v) = millis("TERMINAL__CLOCK_MS") {
        settings.clock_interval = v;
    }
}
