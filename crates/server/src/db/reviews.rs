//! Product reviews.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use bazaar_core::{ProductId, ReviewId, UserId};

use super::RepositoryError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub author_id: UserId,
    pub author_name: String,
    pub rating: i16,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Average rating and count for a product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RatingSummary {
    pub count: i64,
    pub average: Option<f64>,
}

pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<Review>, RepositoryError> {
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT r.id, r.product_id, r.author_id, \
                COALESCE(a.display_name, split_part(a.email, '@', 1)) AS author_name, \
                r.rating, r.body, r.created_at \
             FROM review r JOIN profile a ON a.id = r.author_id \
             WHERE r.product_id = $1 ORDER BY r.created_at DESC",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(reviews)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summary(&self, product_id: ProductId) -> Result<RatingSummary, RepositoryError> {
        let summary = sqlx::query_as::<_, RatingSummary>(
            "SELECT COUNT(*) AS count, AVG(rating)::float8 AS average \
             FROM review WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(summary)
    }

    /// Record a review. Each buyer reviews a product once.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the author already reviewed it.
    pub async fn create(
        &self,
        product_id: ProductId,
        author_id: UserId,
        rating: i16,
        body: &str,
    ) -> Result<ReviewId, RepositoryError> {
        let id = sqlx::query_scalar(
            "INSERT INTO review (product_id, author_id, rating, body) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(product_id)
        .bind(author_id)
        .bind(rating)
        .bind(body)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "you have already reviewed this product"))?;

        Ok(id)
    }

    /// Remove a review (editor moderation).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn delete(&self, id: ReviewId) -> Result<ProductId, RepositoryError> {
        sqlx::query_scalar("DELETE FROM review WHERE id = $1 RETURNING product_id")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}
