//! Session maintenance.
//!
//! Request handling already ends a stale session the next time it is used;
//! pruning catches sessions that are simply abandoned so the admin dashboard
//! does not list them as active.

use bazaar_core::InactivityPolicy;
use bazaar_server::db::SessionRepository;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tower_sessions::ExpiredDeletion;
use tower_sessions_sqlx_store::PostgresStore;

use super::CliError;

/// Sessions last active at or before the first cutoff, or started at or before
/// the second, are past their limits.
fn cutoffs(
    policy: &InactivityPolicy,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), CliError> {
    let out_of_range = || CliError::InvalidArgument("session limits are out of range".to_owned());
    let idle = now
        .checked_sub_signed(policy.idle_timeout)
        .ok_or_else(out_of_range)?;
    let started = now.checked_sub_signed(policy.max_age).ok_or_else(out_of_range)?;
    Ok((idle, started))
}

pub async fn prune(pool: &PgPool, idle_minutes: i64, max_age_hours: i64) -> Result<(), CliError> {
    let policy = InactivityPolicy::from_limits(idle_minutes, max_age_hours)
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
    let (idle_cutoff, started_cutoff) = cutoffs(&policy, Utc::now())?;

    let ended = SessionRepository::new(pool)
        .prune(idle_cutoff, started_cutoff)
        .await?;
    tracing::info!("Ended {} stale session(s)", ended);

    PostgresStore::new(pool.clone())
        .delete_expired()
        .await
        .map_err(|e| CliError::SessionStore(e.to_string()))?;
    tracing::info!("Deleted expired cookie sessions");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_cutoffs() {
        let policy = InactivityPolicy::from_limits(30, 12).expect("valid limits");
        let now = DateTime::<Utc>::from_timestamp(1_767_225_600, 0).expect("valid timestamp");

        let (idle, started) = cutoffs(&policy, now).expect("in range");
        assert_eq!(idle, now - Duration::minutes(30));
        assert_eq!(started, now - Duration::hours(12));
    }

    #[test]
    fn test_cutoffs_out_of_range() {
        let policy = InactivityPolicy::from_limits(30, 12).expect("valid limits");
        assert!(matches!(
            cutoffs(&policy, DateTime::<Utc>::MIN_UTC),
            Err(CliError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_huge_limits_are_rejected() {
        assert!(InactivityPolicy::from_limits(30, i64::MAX).is_err());
    }
}
