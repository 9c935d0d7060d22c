use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(OperatorId);
id_newtype!(EmitterId);

/// Role value that unlocks privileged navigation (user management).
pub const ADMIN_ROLE: &str = "admin";

/// Role shown for operators whose record carries no role.
pub const DEFAULT_ROLE: &str = "user";

/// Identity of the authenticated operator, as returned by the login endpoint.
///
/// Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorIdentity {
    pub id: OperatorId,
    pub username: String,
    #[serde(rename = "nome", default)]
    pub given_name: Option<String>,
    #[serde(rename = "cognome", default)]
    pub family_name: Option<String>,
    #[serde(rename = "ruolo", default)]
    pub role: Option<String>,
    #[serde(rename = "emittente_id", default)]
    pub emitter_id: Option<EmitterId>,
}

impl OperatorIdentity {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }

    /// Header badge text: `"<given> <family> · <role>"`.
    pub fn badge(&self) -> String {
        format!(
            "{} {} · {}",
            self.given_name.as_deref().unwrap_or_default(),
            self.family_name.as_deref().unwrap_or_default(),
            self.role.as_deref().unwrap_or(DEFAULT_ROLE)
        )
        .trim()
        .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Not checked yet, or no session is active.
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn from_ok(ok: bool) -> Self {
        if ok {
            Self::Healthy
        } else {
            Self::Unhealthy
        }
    }

    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoredService {
    Server,
    Printer,
}

impl std::fmt::Display for MonitoredService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Server => f.write_str("server"),
            Self::Printer => f.write_str("printer"),
        }
    }
}
