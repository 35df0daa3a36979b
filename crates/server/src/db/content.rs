//! Content pages and banners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use bazaar_core::{ContentPageId, UserId};

use super::RepositoryError;

const PAGE_COLUMNS: &str =
    "id, slug, title, body_markdown, is_banner, published, author_id, created_at, updated_at";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ContentPage {
    pub id: ContentPageId,
    pub slug: String,
    pub title: String,
    pub body_markdown: String,
    pub is_banner: bool,
    pub published: bool,
    pub author_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentPageInput {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub body_markdown: String,
    #[serde(default)]
    pub is_banner: bool,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ContentPagePatch {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub body_markdown: Option<String>,
    pub is_banner: Option<bool>,
    pub published: Option<bool>,
}

/// Whether `slug` is usable in a URL path: lowercase ASCII letters, digits
/// and single hyphens.
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 100
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

pub struct ContentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ContentRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_published(&self, slug: &str) -> Result<Option<ContentPage>, RepositoryError> {
        let page = sqlx::query_as::<_, ContentPage>(&format!(
            "SELECT {PAGE_COLUMNS} FROM content_page WHERE slug = $1 AND published"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(page)
    }

    /// Published banners, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn banners(&self) -> Result<Vec<ContentPage>, RepositoryError> {
        let pages = sqlx::query_as::<_, ContentPage>(&format!(
            "SELECT {PAGE_COLUMNS} FROM content_page WHERE published AND is_banner \
             ORDER BY updated_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(pages)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<ContentPage>, RepositoryError> {
        let pages = sqlx::query_as::<_, ContentPage>(&format!(
            "SELECT {PAGE_COLUMNS} FROM content_page ORDER BY updated_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(pages)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(
        &self,
        input: &ContentPageInput,
        author_id: UserId,
    ) -> Result<ContentPage, RepositoryError> {
        sqlx::query_as::<_, ContentPage>(&format!(
            "INSERT INTO content_page (slug, title, body_markdown, is_banner, published, author_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {PAGE_COLUMNS}"
        ))
        .bind(&input.slug)
        .bind(input.title.trim())
        .bind(&input.body_markdown)
        .bind(input.is_banner)
        .bind(input.published)
        .bind(author_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "a page with this slug already exists"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the page does not exist and
    /// `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: ContentPageId,
        patch: &ContentPagePatch,
        author_id: UserId,
    ) -> Result<ContentPage, RepositoryError> {
        sqlx::query_as::<_, ContentPage>(&format!(
            "UPDATE content_page SET \
                slug = COALESCE($2, slug), \
                title = COALESCE($3, title), \
                body_markdown = COALESCE($4, body_markdown), \
                is_banner = COALESCE($5, is_banner), \
                published = COALESCE($6, published), \
                author_id = $7, \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {PAGE_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.slug.as_deref())
        .bind(patch.title.as_deref().map(str::trim))
        .bind(patch.body_markdown.as_deref())
        .bind(patch.is_banner)
        .bind(patch.published)
        .bind(author_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "a page with this slug already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the page does not exist.
    pub async fn delete(&self, id: ContentPageId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM content_page WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
