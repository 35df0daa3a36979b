//! Audit trail of staff and system actions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use bazaar_core::{ActivityLogId, UserId};

use super::{PAGE_SIZE, RepositoryError, page_offset};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActivityEntry {
    pub id: ActivityLogId,
    pub actor_id: Option<UserId>,
    pub actor_email: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub details: JsonValue,
    pub created_at: DateTime<Utc>,
}

pub struct ActivityRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ActivityRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record(
        &self,
        actor_id: Option<UserId>,
        action: &str,
        entity_type: &str,
        entity_id: Option<String>,
        details: JsonValue,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO activity_log (actor_id, action, entity_type, entity_id, details) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(actor_id)
        .bind(action)
        .bind(entity_type)
        .bind(entity_id)
        .bind(details)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Record an entry, logging instead of failing the caller's request.
    pub async fn record_or_warn(
        &self,
        actor_id: Option<UserId>,
        action: &str,
        entity_type: &str,
        entity_id: Option<String>,
        details: JsonValue,
    ) {
        if let Err(e) = self
            .record(actor_id, action, entity_type, entity_id, details)
            .await
        {
            tracing::warn!(error = %e, action, entity_type, "Failed to write activity log");
        }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(
        &self,
        entity_type: Option<&str>,
        page: Option<u32>,
    ) -> Result<Vec<ActivityEntry>, RepositoryError> {
        let entries = sqlx::query_as::<_, ActivityEntry>(
            "SELECT l.id, l.actor_id, p.email AS actor_email, l.action, l.entity_type, \
                l.entity_id, l.details, l.created_at \
             FROM activity_log l LEFT JOIN profile p ON p.id = l.actor_id \
             WHERE ($1::text IS NULL OR l.entity_type = $1) \
             ORDER BY l.created_at DESC, l.id DESC LIMIT $2 OFFSET $3",
        )
        .bind(entity_type)
        .bind(PAGE_SIZE)
        .bind(page_offset(page))
        .fetch_all(self.pool)
        .await?;

        Ok(entries)
    }
}
