use anyhow::{Context, Result};

/// bcrypt work factor of newly stored hashes.
pub(crate) const HASH_COST: u32 = 12;

/// Hashes `password` into a self-describing bcrypt string (cost and salt
/// embedded). Runs on the blocking pool.
pub(crate) async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, HASH_COST))
        .await
        .context("password hashing task failed")?
        .context("failed to hash password")
}

/// Checks `password` against a stored bcrypt hash. A hash that cannot be
/// parsed is an error, not a mismatch.
pub(crate) async fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let password = password.to_owned();
    let stored_hash = stored_hash.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &stored_hash))
        .await
        .context("password verification task failed")?
        .context("stored password hash is malformed")
}
