//! Account management.
//!
//! Unlike self-service registration these commands may assign any role, which
//! is how the first admin account is created.

use bazaar_core::{Email, Role, SessionEndReason};
use bazaar_server::db::profiles::Profile;
use bazaar_server::db::{ActivityRepository, ProfileRepository, SessionRepository};
use bazaar_server::services::auth::AuthService;
use serde_json::json;
use sqlx::PgPool;

use super::CliError;

async fn find(pool: &PgPool, email: &str) -> Result<Profile, CliError> {
    let parsed = Email::parse(email).map_err(|e| CliError::InvalidArgument(e.to_string()))?;
    ProfileRepository::new(pool)
        .get_by_email(&parsed)
        .await?
        .ok_or_else(|| CliError::UserNotFound(email.to_owned()))
}

pub async fn create(
    pool: &PgPool,
    email: &str,
    password: &str,
    name: Option<&str>,
    role: Role,
) -> Result<(), CliError> {
    let profile = AuthService::new(pool)
        .register(email, password, name, role)
        .await?;

    ActivityRepository::new(pool)
        .record_or_warn(
            None,
            "user.created",
            "profile",
            Some(profile.id.to_string()),
            json!({ "role": role, "source": "cli" }),
        )
        .await;

    tracing::info!(
        "Account created! ID: {}, Email: {}, Role: {}",
        profile.id,
        profile.email,
        profile.role
    );
    Ok(())
}

pub async fn set_role(pool: &PgPool, email: &str, role: Role) -> Result<(), CliError> {
    let profile = find(pool, email).await?;
    let previous = profile.role;
    let updated = ProfileRepository::new(pool).set_role(profile.id, role).await?;

    ActivityRepository::new(pool)
        .record_or_warn(
            None,
            "user.role_changed",
            "profile",
            Some(updated.id.to_string()),
            json!({ "from": previous, "to": role, "source": "cli" }),
        )
        .await;

    tracing::info!("{} is now {} (was {})", updated.email, role, previous);
    Ok(())
}

pub async fn set_disabled(pool: &PgPool, email: &str, disabled: bool) -> Result<(), CliError> {
    let profile = find(pool, email).await?;
    ProfileRepository::new(pool)
        .set_disabled(profile.id, disabled)
        .await?;

    let ended = if disabled {
        SessionRepository::new(pool)
            .end_for_profile(profile.id, SessionEndReason::Forced)
            .await?
    } else {
        0
    };

    let action = if disabled { "user.disabled" } else { "user.enabled" };
    ActivityRepository::new(pool)
        .record_or_warn(
            None,
            action,
            "profile",
            Some(profile.id.to_string()),
            json!({ "sessions_ended": ended, "source": "cli" }),
        )
        .await;

    if disabled {
        tracing::info!("Disabled {} and ended {} session(s)", profile.email, ended);
    } else {
        tracing::info!("Enabled {}", profile.email);
    }
    Ok(())
}
