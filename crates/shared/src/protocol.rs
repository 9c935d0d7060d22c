use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EmitterId, OperatorId};

pub const LOGIN_ROUTE: &str = "/auth/login";
pub const HEALTH_ROUTE: &str = "/health";
pub const PRINTER_STATUS_ROUTE: &str = "/printer/status";
pub const USERS_ROUTE: &str = "/users";

pub const DEFAULT_PRINTER_PORT: u16 = 9100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PrinterStatusQuery {
    #[serde(rename = "emittente_id")]
    pub emitter_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrinterStatusResponse {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_printer_port")]
    pub port: u16,
    pub online: bool,
}

fn default_printer_port() -> u16 {
    DEFAULT_PRINTER_PORT
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UserListQuery {
    #[serde(rename = "emittente_id", default)]
    pub emitter_id: Option<i64>,
}

/// Operator record as listed by the user-management endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: OperatorId,
    pub username: String,
    #[serde(rename = "nome")]
    pub given_name: Option<String>,
    #[serde(rename = "cognome")]
    pub family_name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
    #[serde(rename = "ruolo")]
    pub role: Option<String>,
    #[serde(rename = "emittente_id")]
    pub emitter_id: Option<EmitterId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(rename = "nome", default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(rename = "cognome", default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "ruolo", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "emittente_id", default, skip_serializing_if = "Option::is_none")]
    pub emitter_id: Option<EmitterId>,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateUserRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(rename = "nome", default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(rename = "cognome", default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "ruolo", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "emittente_id", default, skip_serializing_if = "Option::is_none")]
    pub emitter_id: Option<EmitterId>,
}

impl UpdateUserRequest {
    pub fn is_empty(&self) -> bool {
        self.password.is_none()
            && self.given_name.is_none()
            && self.family_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.role.is_none()
            && self.emitter_id.is_none()
    }
}
