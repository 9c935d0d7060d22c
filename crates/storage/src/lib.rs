use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info};

use shared::{
    domain::{EmitterId, OperatorId, OperatorIdentity},
    protocol::{CreateUserRequest, UpdateUserRequest, UserRecord, DEFAULT_PRINTER_PORT},
};

mod password;

use password::{hash_password, verify_password};

const USER_COLUMNS: &str = "id, username, given_name, family_name, email, phone, role, emitter_id, created_at, updated_at";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Network address of an emitter's receipt printer. `host` is empty when the
/// emitter has no printer configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterEndpoint {
    pub host: String,
    pub port: u16,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        // Every connection to `sqlite::memory:` opens a distinct database.
        let max_connections = if database_url.starts_with("sqlite::memory:") {
            1
        } else {
            5
        };
        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(%database_url, "storage ready");
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_emitter(
        &self,
        name: &str,
        printer_host: Option<&str>,
        printer_port: Option<u16>,
    ) -> Result<EmitterId> {
        let rec = sqlx::query(
            "INSERT INTO emitters (name, printer_host, printer_port) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(name)
        .bind(printer_host)
        .bind(printer_port.map(i64::from))
        .fetch_one(&self.pool)
        .await
        .context("failed to insert emitter")?;
        Ok(EmitterId(rec.get::<i64, _>(0)))
    }

    /// Returns `None` when the emitter does not exist.
    pub async fn printer_endpoint(&self, emitter_id: EmitterId) -> Result<Option<PrinterEndpoint>> {
        let row = sqlx::query(
            "SELECT COALESCE(printer_host, ''), COALESCE(printer_port, ?) FROM emitters WHERE id = ?",
        )
        .bind(i64::from(DEFAULT_PRINTER_PORT))
        .bind(emitter_id.0)
        .fetch_optional(&self.pool)
        .await
        .context("failed to load emitter printer endpoint")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let port: i64 = row.try_get(1)?;
        Ok(Some(PrinterEndpoint {
            host: row.try_get(0)?,
            port: u16::try_from(port).unwrap_or(DEFAULT_PRINTER_PORT),
        }))
    }

    /// Checks credentials and returns the public identity on success.
    pub async fn verify_login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<OperatorIdentity>> {
        let row = sqlx::query(
            "SELECT id, username, given_name, family_name, role, emitter_id, password_hash
             FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("failed to load user for login")?;

        let Some(row) = row else {
            debug!(%username, "login for unknown username");
            return Ok(None);
        };

        let password_hash: String = row.try_get("password_hash")?;
        if !verify_password(password, &password_hash).await? {
            return Ok(None);
        }

        Ok(Some(OperatorIdentity {
            id: OperatorId(row.try_get("id")?),
            username: row.try_get("username")?,
            given_name: row.try_get("given_name")?,
            family_name: row.try_get("family_name")?,
            role: row.try_get("role")?,
            emitter_id: row.try_get::<Option<i64>, _>("emitter_id")?.map(EmitterId),
        }))
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn list_users(&self, emitter_id: Option<EmitterId>) -> Result<Vec<UserRecord>> {
        let emitter = emitter_id.map(|id| id.0);
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE (? IS NULL OR emitter_id = ?) ORDER BY id"
        ))
        .bind(emitter)
        .bind(emitter)
        .fetch_all(&self.pool)
        .await
        .context("failed to list users")?;

        rows.iter().map(user_from_row).collect()
    }

    pub async fn get_user(&self, user_id: OperatorId) -> Result<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    /// Inserts a user. Callers validate the request and check username
    /// uniqueness first; a duplicate still fails on the unique index.
    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<UserRecord> {
        let password_hash = hash_password(&request.password).await?;
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO users
               (username, password_hash, given_name, family_name, email, phone, role, emitter_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&request.username)
        .bind(&password_hash)
        .bind(&request.given_name)
        .bind(&request.family_name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.role)
        .bind(request.emitter_id.map(|id| id.0))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert user '{}'", request.username))?;

        user_from_row(&row)
    }

    /// Applies the supplied fields. An empty update returns the stored
    /// record without touching `updated_at`.
    pub async fn update_user(
        &self,
        user_id: OperatorId,
        request: &UpdateUserRequest,
    ) -> Result<Option<UserRecord>> {
        if request.is_empty() {
            return self.get_user(user_id).await;
        }

        let password_hash = match request.password.as_deref() {
            Some(password) => Some(hash_password(password).await?),
            None => None,
        };
        let row = sqlx::query(&format!(
            "UPDATE users SET
                given_name    = COALESCE(?, given_name),
                family_name   = COALESCE(?, family_name),
                email         = COALESCE(?, email),
                phone         = COALESCE(?, phone),
                role          = COALESCE(?, role),
                emitter_id    = COALESCE(?, emitter_id),
                password_hash = COALESCE(?, password_hash),
                updated_at    = ?
             WHERE id = ?
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&request.given_name)
        .bind(&request.family_name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.role)
        .bind(request.emitter_id.map(|id| id.0))
        .bind(&password_hash)
        .bind(Utc::now())
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to update user {}", user_id.0))?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Returns `false` when no user had that id.
    pub async fn delete_user(&self, user_id: OperatorId) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete user {}", user_id.0))?
            .rows_affected();
        Ok(affected > 0)
    }
}

fn user_from_row(row: &SqliteRow) -> Result<UserRecord> {
    Ok(UserRecord {
        id: OperatorId(row.try_get("id")?),
        username: row.try_get("username")?,
        given_name: row.try_get("given_name")?,
        family_name: row.try_get("family_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        role: row.try_get("role")?,
        emitter_id: row.try_get::<Option<i64>, _>("emitter_id")?.map(EmitterId),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
