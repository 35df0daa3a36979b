//! Login session inactivity rules.
//!
//! Every login creates a tracked session. Requests touch its
//! `last_activity_at`, at most once per `touch_interval`, so an active user
//! does not write to the database on every click. A session ends when it has
//! been idle for `idle_timeout` or has existed for `max_age`, whichever
//! comes first.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest accepted idle timeout, in minutes (one week).
pub const MAX_IDLE_TIMEOUT_MINUTES: i64 = 7 * 24 * 60;

/// Longest accepted absolute session lifetime, in hours (one year).
pub const MAX_SESSION_AGE_HOURS: i64 = 365 * 24;

/// Rejected session limits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("idle timeout must be between 1 and {MAX_IDLE_TIMEOUT_MINUTES} minutes, got {0}")]
    IdleTimeout(i64),
    #[error("session max age must be between 1 and {MAX_SESSION_AGE_HOURS} hours, got {0}")]
    MaxAge(i64),
}

/// Why a tracked session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "session_end_reason", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    Logout,
    IdleTimeout,
    MaxAge,
    /// Terminated by an admin.
    Forced,
    /// Ended because the platform entered maintenance mode.
    Maintenance,
}

/// Which limit expired a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryKind {
    Idle,
    MaxAge,
}

impl From<ExpiryKind> for SessionEndReason {
    fn from(kind: ExpiryKind) -> Self {
        match kind {
            ExpiryKind::Idle => Self::IdleTimeout,
            ExpiryKind::MaxAge => Self::MaxAge,
        }
    }
}

/// Outcome of checking a session against the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionVerdict {
    Active { needs_touch: bool },
    Expired(ExpiryKind),
}

/// Inactivity policy for tracked sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InactivityPolicy {
    pub idle_timeout: Duration,
    pub max_age: Duration,
    pub touch_interval: Duration,
}

impl Default for InactivityPolicy {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::minutes(30),
            max_age: Duration::hours(12),
            touch_interval: Duration::seconds(60),
        }
    }
}

impl InactivityPolicy {
    #[must_use]
    pub fn new(idle_timeout: Duration, max_age: Duration) -> Self {
        Self {
            idle_timeout,
            max_age,
            ..Self::default()
        }
    }

    /// Build a policy from operator-supplied limits.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] if a limit is not positive or exceeds
    /// [`MAX_IDLE_TIMEOUT_MINUTES`] / [`MAX_SESSION_AGE_HOURS`].
    pub fn from_limits(idle_minutes: i64, max_age_hours: i64) -> Result<Self, PolicyError> {
        let idle_timeout = Some(idle_minutes)
            .filter(|m| (1..=MAX_IDLE_TIMEOUT_MINUTES).contains(m))
            .and_then(Duration::try_minutes)
            .ok_or(PolicyError::IdleTimeout(idle_minutes))?;
        let max_age = Some(max_age_hours)
            .filter(|h| (1..=MAX_SESSION_AGE_HOURS).contains(h))
            .and_then(Duration::try_hours)
            .ok_or(PolicyError::MaxAge(max_age_hours))?;

        Ok(Self::new(idle_timeout, max_age))
    }

    /// Check a session at time `now`.
    #[must_use]
    pub fn evaluate(
        &self,
        started_at: DateTime<Utc>,
        last_activity_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> SessionVerdict {
        if now - started_at >= self.max_age {
            return SessionVerdict::Expired(ExpiryKind::MaxAge);
        }

        let idle = now - last_activity_at;
        if idle >= self.idle_timeout {
            return SessionVerdict::Expired(ExpiryKind::Idle);
        }

        SessionVerdict::Active {
            needs_touch: idle >= self.touch_interval,
        }
    }

    /// Cutoff before which an idle session counts as expired; used by bulk
    /// pruning.
    #[must_use]
    pub fn idle_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.idle_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).expect("valid timestamp")
            + Duration::minutes(minutes)
    }

    #[test]
    fn test_fresh_session_is_active_without_touch() {
        let policy = InactivityPolicy::default();
        assert_eq!(
            policy.evaluate(at(0), at(0), at(0)),
            SessionVerdict::Active { needs_touch: false }
        );
    }

    #[test]
    fn test_touch_after_interval() {
        let policy = InactivityPolicy::default();
        assert_eq!(
            policy.evaluate(at(0), at(0), at(2)),
            SessionVerdict::Active { needs_touch: true }
        );
    }

    #[test]
    fn test_idle_expiry_at_boundary() {
        let policy = InactivityPolicy::default();
        assert_eq!(
            policy.evaluate(at(0), at(10), at(39)),
            SessionVerdict::Active { needs_touch: true }
        );
        assert_eq!(
            policy.evaluate(at(0), at(10), at(40)),
            SessionVerdict::Expired(ExpiryKind::Idle)
        );
    }

    #[test]
    fn test_max_age_wins_over_recent_activity() {
        let policy = InactivityPolicy::new(Duration::minutes(30), Duration::hours(1));
        assert_eq!(
            policy.evaluate(at(0), at(59), at(60)),
            SessionVerdict::Expired(ExpiryKind::MaxAge)
        );
    }

    #[test]
    fn test_from_limits_bounds() {
        let policy = InactivityPolicy::from_limits(30, 12).expect("valid limits");
        assert_eq!(policy, InactivityPolicy::default());

        assert!(InactivityPolicy::from_limits(MAX_IDLE_TIMEOUT_MINUTES, MAX_SESSION_AGE_HOURS).is_ok());
        assert_eq!(
            InactivityPolicy::from_limits(0, 12),
            Err(PolicyError::IdleTimeout(0))
        );
        assert_eq!(
            InactivityPolicy::from_limits(30, -1),
            Err(PolicyError::MaxAge(-1))
        );
        assert_eq!(
            InactivityPolicy::from_limits(30, i64::MAX),
            Err(PolicyError::MaxAge(i64::MAX))
        );
        assert_eq!(
            InactivityPolicy::from_limits(i64::MAX, 12),
            Err(PolicyError::IdleTimeout(i64::MAX))
        );
    }

    #[test]
    fn test_end_reason_from_expiry() {
        assert_eq!(
            SessionEndReason::from(ExpiryKind::Idle),
            SessionEndReason::IdleTimeout
        );
        assert_eq!(
            SessionEndReason::from(ExpiryKind::MaxAge),
            SessionEndReason::MaxAge
        );
    }
}
