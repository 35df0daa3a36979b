//! Tracked login sessions and the session event log.
//!
//! A `user_session` row is created at login and referenced from the cookie
//! session. Every end (logout, timeout, admin action, maintenance) sets
//! `ended_at`/`end_reason` once and appends an `ended` event to `session_log`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use bazaar_core::{Role, SessionEndReason, UserId};

use super::{PAGE_SIZE, RepositoryError, page_offset};

/// Kind of entry in the session log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "session_event", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    Login,
    LoginFailed,
    Ended,
}

/// A tracked session joined with the state of its profile.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRecord {
    pub id: Uuid,
    pub profile_id: UserId,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<SessionEndReason>,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub disabled: bool,
}

/// An open session as listed on the admin dashboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActiveSession {
    pub id: Uuid,
    pub profile_id: UserId,
    pub email: String,
    pub role: Role,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SessionLogEntry {
    pub id: i64,
    pub session_id: Option<Uuid>,
    pub profile_id: Option<UserId>,
    pub email: Option<String>,
    pub event: SessionEvent,
    pub reason: Option<SessionEndReason>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ends every open session matching `filter` and logs one `ended` event per
/// session. `$1` is the end reason; the filter may use `$2`, `$3`.
fn end_sessions_sql(filter: &str) -> String {
    format!(
        "WITH ended AS ( \
            UPDATE user_session s SET ended_at = NOW(), end_reason = $1 \
            WHERE s.ended_at IS NULL AND ({filter}) \
            RETURNING s.id, s.profile_id, s.ip_address) \
         INSERT INTO session_log (session_id, profile_id, email, event, reason, ip_address) \
         SELECT e.id, e.profile_id, p.email, 'ended', $1, e.ip_address \
         FROM ended e JOIN profile p ON p.id = e.profile_id"
    )
}

pub struct SessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Open a tracked session and log the login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn start(
        &self,
        profile_id: UserId,
        email: &str,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<Uuid, RepositoryError> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO user_session (id, profile_id, user_agent, ip_address) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(profile_id)
        .bind(user_agent)
        .bind(ip_address)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO session_log (session_id, profile_id, email, event, ip_address) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(profile_id)
        .bind(email)
        .bind(SessionEvent::Login)
        .bind(ip_address)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn log_failed_login(
        &self,
        email: &str,
        ip_address: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO session_log (profile_id, email, event, ip_address) \
             VALUES ((SELECT id FROM profile WHERE email = $1), $1, $2, $3)",
        )
        .bind(email)
        .bind(SessionEvent::LoginFailed)
        .bind(ip_address)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn load(&self, id: Uuid) -> Result<Option<SessionRecord>, RepositoryError> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT s.id, s.profile_id, s.started_at, s.last_activity_at, s.ended_at, \
                s.end_reason, p.email, p.display_name, p.role, p.disabled \
             FROM user_session s JOIN profile p ON p.id = s.profile_id \
             WHERE s.id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn touch(&self, id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE user_session SET last_activity_at = NOW() \
             WHERE id = $1 AND ended_at IS NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// End one session. Returns `false` if it had already ended.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn end(&self, id: Uuid, reason: SessionEndReason) -> Result<bool, RepositoryError> {
        let result = sqlx::query(&end_sessions_sql("s.id = $2"))
            .bind(reason)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// End every open session of a profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn end_for_profile(
        &self,
        profile_id: UserId,
        reason: SessionEndReason,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(&end_sessions_sql("s.profile_id = $2"))
            .bind(reason)
            .bind(profile_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// End every open session whose profile is not an admin.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn end_all_except_admins(
        &self,
        reason: SessionEndReason,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(&end_sessions_sql(
            "s.profile_id IN (SELECT id FROM profile WHERE role <> 'admin')",
        ))
        .bind(reason)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// End sessions idle since before `idle_cutoff` or started before
    /// `started_cutoff`. Returns how many were ended.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn prune(
        &self,
        idle_cutoff: DateTime<Utc>,
        started_cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let max_age = sqlx::query(&end_sessions_sql("s.started_at <= $2"))
            .bind(SessionEndReason::MaxAge)
            .bind(started_cutoff)
            .execute(self.pool)
            .await?;

        let idle = sqlx::query(&end_sessions_sql("s.last_activity_at <= $2"))
            .bind(SessionEndReason::IdleTimeout)
            .bind(idle_cutoff)
            .execute(self.pool)
            .await?;

        Ok(max_age.rows_affected() + idle.rows_affected())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self, page: Option<u32>) -> Result<Vec<ActiveSession>, RepositoryError> {
        let sessions = sqlx::query_as::<_, ActiveSession>(
            "SELECT s.id, s.profile_id, p.email, p.role, s.user_agent, s.ip_address, \
                s.started_at, s.last_activity_at \
             FROM user_session s JOIN profile p ON p.id = s.profile_id \
             WHERE s.ended_at IS NULL \
             ORDER BY s.last_activity_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(PAGE_SIZE)
        .bind(page_offset(page))
        .fetch_all(self.pool)
        .await?;

        Ok(sessions)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn logs(
        &self,
        profile_id: Option<UserId>,
        page: Option<u32>,
    ) -> Result<Vec<SessionLogEntry>, RepositoryError> {
        let entries = sqlx::query_as::<_, SessionLogEntry>(
            "SELECT id, session_id, profile_id, email, event, reason, ip_address, created_at \
             FROM session_log WHERE ($1::int IS NULL OR profile_id = $1) \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
        )
        .bind(profile_id)
        .bind(PAGE_SIZE)
        .bind(page_offset(page))
        .fetch_all(self.pool)
        .await?;

        Ok(entries)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_active(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM user_session WHERE ended_at IS NULL")
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_sessions_sql_scopes_to_open_sessions() {
        let sql = end_sessions_sql("s.id = $2");
        assert!(sql.contains("WHERE s.ended_at IS NULL AND (s.id = $2)"));
        assert!(sql.contains("'ended', $1"));
    }
}
