//! Direct messages between users.
//!
//! Conversations are polled: clients pass the `created_at` of the newest
//! message they hold as `after` and get only what arrived since.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use bazaar_core::{MessageId, OrderId, ProductId, UserId};

use super::RepositoryError;

/// Most messages returned by one thread request.
const THREAD_LIMIT: i64 = 200;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub product_id: Option<ProductId>,
    pub order_id: Option<OrderId>,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Latest message per conversation partner.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Conversation {
    pub partner_id: UserId,
    pub partner_name: String,
    pub last_body: String,
    pub last_at: DateTime<Utc>,
    pub unread: i64,
}

#[derive(Debug, Clone)]
pub struct NewMessage<'m> {
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub product_id: Option<ProductId>,
    pub order_id: Option<OrderId>,
    pub body: &'m str,
}

/// Without a cursor the newest `$4` messages are fetched and later reversed;
/// with one, the oldest `$4` after it, so a poll never skips rows.
fn thread_sql(with_cursor: bool) -> String {
    let order = if with_cursor {
        "created_at ASC, id ASC"
    } else {
        "created_at DESC, id DESC"
    };
    format!(
        "SELECT id, sender_id, recipient_id, product_id, order_id, body, read_at, created_at \
         FROM message \
         WHERE ((sender_id = $1 AND recipient_id = $2) \
             OR (sender_id = $2 AND recipient_id = $1)) \
           AND ($3::timestamptz IS NULL OR created_at > $3) \
         ORDER BY {order} LIMIT $4"
    )
}

pub struct MessageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MessageRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the recipient does not exist.
    pub async fn send(&self, message: &NewMessage<'_>) -> Result<Message, RepositoryError> {
        sqlx::query_as::<_, Message>(
            "INSERT INTO message (sender_id, recipient_id, product_id, order_id, body) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, sender_id, recipient_id, product_id, order_id, body, read_at, \
                created_at",
        )
        .bind(message.sender_id)
        .bind(message.recipient_id)
        .bind(message.product_id)
        .bind(message.order_id)
        .bind(message.body)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                RepositoryError::NotFound
            }
            other => RepositoryError::Database(other),
        })
    }

    /// One row per conversation partner, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn inbox(&self, user_id: UserId) -> Result<Vec<Conversation>, RepositoryError> {
        let conversations = sqlx::query_as::<_, Conversation>(
            "WITH mine AS ( \
                SELECT m.*, CASE WHEN m.sender_id = $1 THEN m.recipient_id \
                                 ELSE m.sender_id END AS partner_id \
                FROM message m WHERE m.sender_id = $1 OR m.recipient_id = $1), \
             latest AS ( \
                SELECT DISTINCT ON (partner_id) partner_id, body, created_at \
                FROM mine ORDER BY partner_id, created_at DESC, id DESC) \
             SELECT l.partner_id, \
                COALESCE(p.store_name, p.display_name, split_part(p.email, '@', 1)) \
                    AS partner_name, \
                l.body AS last_body, l.created_at AS last_at, \
                (SELECT COUNT(*) FROM mine u WHERE u.partner_id = l.partner_id \
                    AND u.recipient_id = $1 AND u.read_at IS NULL) AS unread \
             FROM latest l JOIN profile p ON p.id = l.partner_id \
             ORDER BY l.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(conversations)
    }

    /// Messages between two users, oldest first, optionally only those newer
    /// than `after`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn thread(
        &self,
        user_id: UserId,
        partner_id: UserId,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, RepositoryError> {
        let mut messages = sqlx::query_as::<_, Message>(&thread_sql(after.is_some()))
            .bind(user_id)
            .bind(partner_id)
            .bind(after)
            .bind(THREAD_LIMIT)
            .fetch_all(self.pool)
            .await?;

        if after.is_none() {
            messages.reverse();
        }
        Ok(messages)
    }

    /// Mark everything `partner_id` sent to `user_id` as read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_thread_read(
        &self,
        user_id: UserId,
        partner_id: UserId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE message SET read_at = NOW() \
             WHERE recipient_id = $1 AND sender_id = $2 AND read_at IS NULL",
        )
        .bind(user_id)
        .bind(partner_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM message WHERE recipient_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }
}
