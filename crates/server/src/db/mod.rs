//! Database operations for the marketplace `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `profile`, `profile_password` - Users, roles and password hashes
//! - `product` - Seller listings
//! - `customer_order`, `order_item` - Orders; each item carries its own status
//! - `review` - Product reviews
//! - `message`, `claim`, `activity_log` - Communication and audit records
//! - `user_session`, `session_log` - Tracked login sessions and their events
//! - `content_page` - Pages and banners owned by content managers
//! - `setting` - JSONB settings; key `platform` holds the lock flags
//! - `tower_sessions.session` - Cookie session storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p bazaar-cli -- migrate
//! ```

pub mod activity;
pub mod claims;
pub mod content;
pub mod messages;
pub mod orders;
pub mod products;
pub mod profiles;
pub mod reviews;
pub mod sessions;
pub mod settings;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use activity::ActivityRepository;
pub use claims::ClaimRepository;
pub use content::ContentRepository;
pub use messages::MessageRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use profiles::ProfileRepository;
pub use reviews::ReviewRepository;
pub use sessions::SessionRepository;

/// Default page size for list endpoints.
pub const PAGE_SIZE: i64 = 24;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict`, anything else to `Database`.
    pub(crate) fn unique(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Offset for a 1-based page number.
#[must_use]
pub fn page_offset(page: Option<u32>) -> i64 {
    i64::from(page.unwrap_or(1).max(1) - 1) * PAGE_SIZE
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(None), 0);
        assert_eq!(page_offset(Some(0)), 0);
        assert_eq!(page_offset(Some(1)), 0);
        assert_eq!(page_offset(Some(3)), 2 * PAGE_SIZE);
    }

    #[test]
    fn test_unique_passes_through_other_errors() {
        let err = RepositoryError::unique(sqlx::Error::RowNotFound, "email taken");
        assert!(matches!(err, RepositoryError::Database(_)));
    }
}
