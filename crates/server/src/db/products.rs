//! Product listings: shopper search, seller management and editor review.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use bazaar_core::{Money, ProductId, ProductStatus, UserId};

use super::{PAGE_SIZE, RepositoryError, page_offset};

const PRODUCT_COLUMNS: &str = "p.id, p.seller_id, p.title, p.description, p.category, p.price, \
     p.stock, p.image_url, p.status, p.rejection_reason, p.created_at, p.updated_at, \
     COALESCE(s.store_name, s.display_name, split_part(s.email, '@', 1)) AS seller_name";

/// A product listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: UserId,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub price: Money,
    pub stock: i32,
    pub image_url: Option<String>,
    pub status: ProductStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub seller_name: String,
}

impl Product {
    /// Stock as an unsigned count; the column is constrained non-negative.
    #[must_use]
    pub fn available(&self) -> u32 {
        u32::try_from(self.stock).unwrap_or(0)
    }
}

/// Sort order for the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Title,
}

impl ProductSort {
    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
            Self::Title => "lower(p.title) ASC, p.id ASC",
        }
    }
}

/// Catalog query parameters.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub seller: Option<UserId>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort: ProductSort,
    pub page: Option<u32>,
}

/// Fields a seller sets when creating or editing a listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    pub price: Money,
    pub stock: u32,
    pub image_url: Option<String>,
}

/// Partial listing update; `None` leaves a field unchanged.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProductPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Money>,
    pub stock: Option<u32>,
    pub image_url: Option<String>,
}

fn stock_param(stock: u32) -> Result<i32, RepositoryError> {
    i32::try_from(stock).map_err(|_| RepositoryError::Conflict("stock is too large".to_owned()))
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Search active listings.
    ///
    /// `q` matches title, description and category case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(&self, query: &ProductQuery) -> Result<Vec<Product>, RepositoryError> {
        let pattern = query
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{q}%"));
        let category = query
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product p JOIN profile s ON s.id = p.seller_id \
             WHERE p.status = 'active' AND NOT s.disabled \
               AND ($1::text IS NULL OR p.title ILIKE $1 OR p.description ILIKE $1 \
                    OR p.category ILIKE $1) \
               AND ($2::text IS NULL OR lower(p.category) = lower($2)) \
               AND ($3::int IS NULL OR p.seller_id = $3) \
               AND ($4::numeric IS NULL OR p.price >= $4) \
               AND ($5::numeric IS NULL OR p.price <= $5) \
             ORDER BY {} LIMIT $6 OFFSET $7",
            query.sort.order_by()
        ))
        .bind(pattern)
        .bind(category)
        .bind(query.seller)
        .bind(query.min_price)
        .bind(query.max_price)
        .bind(PAGE_SIZE)
        .bind(page_offset(query.page))
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Get a listing regardless of status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product p JOIN profile s ON s.id = p.seller_id \
             WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Get a listing visible to shoppers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` unless the listing is active.
    pub async fn get_active(&self, id: ProductId) -> Result<Product, RepositoryError> {
        self.get(id)
            .await?
            .filter(|p| p.status == ProductStatus::Active)
            .ok_or(RepositoryError::NotFound)
    }

    /// Distinct categories of active listings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let categories = sqlx::query_scalar(
            "SELECT DISTINCT category FROM product \
             WHERE status = 'active' AND category IS NOT NULL ORDER BY category",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_seller(&self, seller_id: UserId) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product p JOIN profile s ON s.id = p.seller_id \
             WHERE p.seller_id = $1 AND p.status <> 'archived' \
             ORDER BY p.updated_at DESC, p.id DESC"
        ))
        .bind(seller_id)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Get a listing owned by `seller_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the listing does not exist or
    /// belongs to another seller.
    pub async fn get_owned(
        &self,
        id: ProductId,
        seller_id: UserId,
    ) -> Result<Product, RepositoryError> {
        self.get(id)
            .await?
            .filter(|p| p.seller_id == seller_id)
            .ok_or(RepositoryError::NotFound)
    }

    /// Create a draft listing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        seller_id: UserId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let id: ProductId = sqlx::query_scalar(
            "INSERT INTO product (seller_id, title, description, category, price, stock, image_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(seller_id)
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(input.category.as_deref())
        .bind(input.price)
        .bind(stock_param(input.stock)?)
        .bind(input.image_url.as_deref())
        .fetch_one(self.pool)
        .await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Update a listing owned by `seller_id`.
    ///
    /// Editing an active or rejected listing sends it back to draft so it is
    /// reviewed again before going live.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the listing is not the seller's.
    pub async fn update(
        &self,
        id: ProductId,
        seller_id: UserId,
        patch: &ProductPatch,
    ) -> Result<Product, RepositoryError> {
        let current = self.get_owned(id, seller_id).await?;
        if !current.status.is_editable() {
            return Err(RepositoryError::Conflict(
                "archived listings cannot be edited".to_owned(),
            ));
        }

        let content_changed = patch.title.is_some()
            || patch.description.is_some()
            || patch.category.is_some()
            || patch.price.is_some()
            || patch.image_url.is_some();
        let next_status = if content_changed {
            match current.status {
                ProductStatus::Active | ProductStatus::Rejected => ProductStatus::Draft,
                other => other,
            }
        } else {
            current.status
        };
        let stock = patch.stock.map(stock_param).transpose()?;

        sqlx::query(
            "UPDATE product SET \
                title = COALESCE($3, title), \
                description = COALESCE($4, description), \
                category = COALESCE($5, category), \
                price = COALESCE($6, price), \
                stock = COALESCE($7, stock), \
                image_url = COALESCE($8, image_url), \
                status = $9, \
                updated_at = NOW() \
             WHERE id = $1 AND seller_id = $2",
        )
        .bind(id)
        .bind(seller_id)
        .bind(patch.title.as_deref().map(str::trim))
        .bind(patch.description.as_deref())
        .bind(patch.category.as_deref())
        .bind(patch.price)
        .bind(stock)
        .bind(patch.image_url.as_deref())
        .bind(next_status)
        .execute(self.pool)
        .await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Archive a listing. Archived listings stay referenced by past orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the listing is not the seller's.
    pub async fn archive(&self, id: ProductId, seller_id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE product SET status = 'archived', updated_at = NOW() \
             WHERE id = $1 AND seller_id = $2",
        )
        .bind(id)
        .bind(seller_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Submit a draft or rejected listing for editor review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the listing cannot be submitted.
    pub async fn submit(&self, id: ProductId, seller_id: UserId) -> Result<Product, RepositoryError> {
        let current = self.get_owned(id, seller_id).await?;
        if !current.status.can_submit() {
            return Err(RepositoryError::Conflict(format!(
                "a {:?} listing cannot be submitted for review",
                current.status
            )));
        }

        self.set_status(id, ProductStatus::PendingReview, None).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_pending_review(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product p JOIN profile s ON s.id = p.seller_id \
             WHERE p.status = 'pending_review' ORDER BY p.updated_at ASC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Approve or reject a listing that is pending review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the listing does not exist and
    /// `RepositoryError::Conflict` if it is not pending review.
    pub async fn review(
        &self,
        id: ProductId,
        approve: bool,
        reason: Option<&str>,
    ) -> Result<Product, RepositoryError> {
        let current = self.get(id).await?.ok_or(RepositoryError::NotFound)?;
        if current.status != ProductStatus::PendingReview {
            return Err(RepositoryError::Conflict(
                "listing is not pending review".to_owned(),
            ));
        }

        if approve {
            self.set_status(id, ProductStatus::Active, None).await
        } else {
            self.set_status(id, ProductStatus::Rejected, reason).await
        }
    }

    async fn set_status(
        &self,
        id: ProductId,
        status: ProductStatus,
        rejection_reason: Option<&str>,
    ) -> Result<Product, RepositoryError> {
        sqlx::query(
            "UPDATE product SET status = $2, rejection_reason = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(rejection_reason)
        .execute(self.pool)
        .await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Listing counts per status for one seller.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_by_status(
        &self,
        seller_id: Option<UserId>,
    ) -> Result<Vec<(ProductStatus, i64)>, RepositoryError> {
        let counts = sqlx::query_as::<_, (ProductStatus, i64)>(
            "SELECT status, COUNT(*) FROM product \
             WHERE ($1::int IS NULL OR seller_id = $1) GROUP BY status ORDER BY status",
        )
        .bind(seller_id)
        .fetch_all(self.pool)
        .await?;

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_parses_from_query_string_values() {
        let sort: ProductSort = serde_json::from_str("\"price_desc\"").expect("valid sort");
        assert_eq!(sort, ProductSort::PriceDesc);
        assert_eq!(ProductSort::default().order_by(), "p.created_at DESC, p.id DESC");
    }

    #[test]
    fn test_stock_param_rejects_overflow() {
        assert_eq!(stock_param(12).ok(), Some(12));
        assert!(stock_param(u32::MAX).is_err());
    }
}
