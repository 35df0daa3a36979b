//! Buyer claims (disputes) against orders.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use bazaar_core::{ClaimId, ClaimStatus, OrderId, UserId};

use super::{PAGE_SIZE, RepositoryError, page_offset};

const CLAIM_COLUMNS: &str = "id, order_id, claimant_id, reason, details, status, resolution, \
     handled_by, created_at, updated_at";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Claim {
    pub id: ClaimId,
    pub order_id: OrderId,
    pub claimant_id: UserId,
    pub reason: String,
    pub details: String,
    pub status: ClaimStatus,
    pub resolution: Option<String>,
    pub handled_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct ClaimRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ClaimRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Open a claim on one of the claimant's own orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order is not the claimant's
    /// and `RepositoryError::Conflict` if an unresolved claim already exists.
    pub async fn open(
        &self,
        order_id: OrderId,
        claimant_id: UserId,
        reason: &str,
        details: &str,
    ) -> Result<Claim, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<UserId> =
            sqlx::query_scalar("SELECT buyer_id FROM customer_order WHERE id = $1 FOR UPDATE")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?;
        if owner != Some(claimant_id) {
            return Err(RepositoryError::NotFound);
        }

        let pending: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM claim \
                WHERE order_id = $1 AND status IN ('open', 'in_review'))",
        )
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await?;
        if pending {
            return Err(RepositoryError::Conflict(
                "this order already has an unresolved claim".to_owned(),
            ));
        }

        let claim = sqlx::query_as::<_, Claim>(&format!(
            "INSERT INTO claim (order_id, claimant_id, reason, details) \
             VALUES ($1, $2, $3, $4) RETURNING {CLAIM_COLUMNS}"
        ))
        .bind(order_id)
        .bind(claimant_id)
        .bind(reason)
        .bind(details)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(claim)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_claimant(&self, claimant_id: UserId) -> Result<Vec<Claim>, RepositoryError> {
        let claims = sqlx::query_as::<_, Claim>(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claim WHERE claimant_id = $1 ORDER BY created_at DESC"
        ))
        .bind(claimant_id)
        .fetch_all(self.pool)
        .await?;

        Ok(claims)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<ClaimStatus>,
        page: Option<u32>,
    ) -> Result<Vec<Claim>, RepositoryError> {
        let claims = sqlx::query_as::<_, Claim>(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claim \
             WHERE ($1::claim_status IS NULL OR status = $1) \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(PAGE_SIZE)
        .bind(page_offset(page))
        .fetch_all(self.pool)
        .await?;

        Ok(claims)
    }

    /// Move a claim forward.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the claim does not exist and
    /// `RepositoryError::Conflict` if the transition is not allowed.
    pub async fn set_status(
        &self,
        id: ClaimId,
        next: ClaimStatus,
        resolution: Option<&str>,
        handled_by: UserId,
    ) -> Result<Claim, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: ClaimStatus =
            sqlx::query_scalar("SELECT status FROM claim WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;
        current
            .transition_to(next)
            .map_err(|e| RepositoryError::Conflict(e.to_string()))?;

        let claim = sqlx::query_as::<_, Claim>(&format!(
            "UPDATE claim SET status = $2, resolution = COALESCE($3, resolution), \
                handled_by = $4, updated_at = NOW() \
             WHERE id = $1 RETURNING {CLAIM_COLUMNS}"
        ))
        .bind(id)
        .bind(next)
        .bind(resolution)
        .bind(handled_by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(claim)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_unresolved(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM claim WHERE status IN ('open', 'in_review')",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }
}
