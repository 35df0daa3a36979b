//! Command implementations.

pub mod migrate;
pub mod platform;
pub mod sessions;
pub mod user;

use bazaar_server::db::RepositoryError;
use bazaar_server::db::settings::SettingsError;
use bazaar_server::services::auth::AuthError;
use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error("No account with email: {0}")]
    UserNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Connect to the database named by `BAZAAR_DATABASE_URL`.
pub async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("BAZAAR_DATABASE_URL")
        .map_err(|_| CliError::MissingEnvVar("BAZAAR_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = bazaar_server::db::create_pool(&SecretString::from(database_url)).await?;
    Ok(pool)
}
