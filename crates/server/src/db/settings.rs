//! Settings database operations.
//!
//! Settings are JSONB values keyed by name. The platform lock flags live under
//! [`PLATFORM_KEY`].

use bazaar_core::{PlatformFlags, UserId};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

pub const PLATFORM_KEY: &str = "platform";

/// Error type for settings operations.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Repository(#[from] super::RepositoryError),
}

/// Get a setting value.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn get_setting(pool: &PgPool, key: &str) -> Result<Option<JsonValue>, SettingsError> {
    let value = sqlx::query_scalar("SELECT value FROM setting WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(value)
}

/// Set a setting value.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn set_setting(
    pool: &PgPool,
    key: &str,
    value: &JsonValue,
    updated_by: Option<UserId>,
) -> Result<(), SettingsError> {
    sqlx::query(
        "INSERT INTO setting (key, value, updated_by) VALUES ($1, $2, $3) \
         ON CONFLICT (key) DO UPDATE SET value = $2, updated_by = $3, updated_at = NOW()",
    )
    .bind(key)
    .bind(value)
    .bind(updated_by)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load the platform flags. A missing row means everything is unlocked.
///
/// # Errors
///
/// Returns an error if the query fails or the stored value is malformed.
pub async fn get_platform_flags(pool: &PgPool) -> Result<PlatformFlags, SettingsError> {
    match get_setting(pool, PLATFORM_KEY).await? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(PlatformFlags::default()),
    }
}

/// # Errors
///
/// Returns an error if the flags cannot be serialized or stored.
pub async fn set_platform_flags(
    pool: &PgPool,
    flags: &PlatformFlags,
    updated_by: Option<UserId>,
) -> Result<(), SettingsError> {
    let value = serde_json::to_value(flags)?;
    set_setting(pool, PLATFORM_KEY, &value, updated_by).await
}
