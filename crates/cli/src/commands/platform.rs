//! Platform lock flags.
//!
//! Writes go through `PlatformService` so that switching maintenance on ends
//! non-admin sessions exactly as the admin dashboard does. Running servers
//! pick the change up when their flag cache expires.

use bazaar_core::PlatformFlags;
use bazaar_server::db::settings;
use bazaar_server::services::platform::{FLAGS_TTL, PlatformService};
use sqlx::PgPool;

use super::CliError;

const MAX_MESSAGE_LENGTH: usize = 500;

async fn update(pool: &PgPool, change: impl FnOnce(&mut PlatformFlags)) -> Result<(), CliError> {
    let service = PlatformService::new(pool.clone());
    let mut flags = settings::get_platform_flags(pool).await?;
    change(&mut flags);

    let flags = service.update(flags, None).await?;
    tracing::info!(
        maintenance = flags.maintenance_mode,
        checkout_locked = flags.checkout_locked,
        registration_locked = flags.registration_locked,
        "Platform flags updated; servers apply them within {}s",
        FLAGS_TTL.as_secs()
    );
    Ok(())
}

pub async fn status(pool: &PgPool) -> Result<(), CliError> {
    let flags = settings::get_platform_flags(pool).await?;
    let rendered = serde_json::to_string_pretty(&flags)
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;

    #[allow(clippy::print_stdout)]
    {
        println!("{rendered}");
    }
    Ok(())
}

pub async fn maintenance(
    pool: &PgPool,
    on: bool,
    message: Option<String>,
) -> Result<(), CliError> {
    if message
        .as_ref()
        .is_some_and(|m| m.chars().count() > MAX_MESSAGE_LENGTH)
    {
        return Err(CliError::InvalidArgument(format!(
            "maintenance message must be at most {MAX_MESSAGE_LENGTH} characters"
        )));
    }

    update(pool, |flags| {
        flags.maintenance_mode = on;
        if message.is_some() {
            flags.maintenance_message = message;
        }
    })
    .await
}

pub async fn checkout_lock(pool: &PgPool, on: bool) -> Result<(), CliError> {
    update(pool, |flags| flags.checkout_locked = on).await
}

pub async fn registration_lock(pool: &PgPool, on: bool) -> Result<(), CliError> {
    update(pool, |flags| flags.registration_locked = on).await
}
