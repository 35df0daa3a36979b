//! Database migrations.
//!
//! Application tables live in `crates/server/migrations/`; the cookie session
//! table is created by the session store itself.

use sqlx::PgPool;
use tower_sessions_sqlx_store::PostgresStore;

use super::CliError;

/// Run the application migrations, then the session store migration.
pub async fn run(pool: &PgPool) -> Result<(), CliError> {
    tracing::info!("Running application migrations...");
    sqlx::migrate!("../server/migrations").run(pool).await?;

    tracing::info!("Running session store migration...");
    PostgresStore::new(pool.clone()).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
