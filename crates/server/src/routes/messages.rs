//! Direct messages between users.
//!
//! Clients poll `GET /api/messages/thread/{user}?after=<timestamp>` for new
//! messages in an open conversation.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use bazaar_core::{OrderId, ProductId, UserId};

use crate::db::MessageRepository;
use crate::db::messages::{Conversation, Message, NewMessage};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

const MAX_MESSAGE_LEN: usize = 4000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/messages", get(inbox).post(send))
        .route("/api/messages/thread/{user}", get(thread))
        .route("/api/messages/thread/{user}/read", post(mark_read))
}

#[derive(Debug, Serialize)]
pub struct InboxResponse {
    pub conversations: Vec<Conversation>,
    pub unread: i64,
}

#[derive(Debug, Deserialize)]
pub struct ThreadQuery {
    pub after: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub recipient_id: UserId,
    pub body: String,
    pub product_id: Option<ProductId>,
    pub order_id: Option<OrderId>,
}

/// Trimmed message body, rejected when empty or too long.
fn message_body(raw: &str) -> Result<&str> {
    let body = raw.trim();
    if body.is_empty() {
        return Err(AppError::BadRequest("message cannot be empty".to_owned()));
    }
    if body.chars().count() > MAX_MESSAGE_LEN {
        return Err(AppError::BadRequest(format!(
            "message must be at most {MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(body)
}

pub async fn inbox(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<InboxResponse>> {
    let messages = MessageRepository::new(state.pool());
    let conversations = messages.inbox(user.id).await?;
    let unread = messages.unread_count(user.id).await?;

    Ok(Json(InboxResponse {
        conversations,
        unread,
    }))
}

pub async fn thread(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(partner): Path<UserId>,
    Query(query): Query<ThreadQuery>,
) -> Result<Json<Vec<Message>>> {
    Ok(Json(
        MessageRepository::new(state.pool())
            .thread(user.id, partner, query.after)
            .await?,
    ))
}

#[instrument(skip(state, body), fields(sender_id = %user.id, recipient_id = %body.recipient_id))]
pub async fn send(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<SendRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    if body.recipient_id == user.id {
        return Err(AppError::BadRequest("you cannot message yourself".to_owned()));
    }
    let text = message_body(&body.body)?;

    let message = MessageRepository::new(state.pool())
        .send(&NewMessage {
            sender_id: user.id,
            recipient_id: body.recipient_id,
            product_id: body.product_id,
            order_id: body.order_id,
            body: text,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub marked: u64,
}

pub async fn mark_read(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(partner): Path<UserId>,
) -> Result<Json<MarkReadResponse>> {
    let marked = MessageRepository::new(state.pool())
        .mark_thread_read(user.id, partner)
        .await?;

    Ok(Json(MarkReadResponse { marked }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_body_is_trimmed() {
        assert_eq!(message_body("  hi there \n").expect("valid"), "hi there");
    }

    #[test]
    fn test_message_body_limits() {
        assert!(message_body(" \t ").is_err());
        assert!(message_body(&"m".repeat(MAX_MESSAGE_LEN)).is_ok());
        assert!(message_body(&"m".repeat(MAX_MESSAGE_LEN + 1)).is_err());
    }

    #[test]
    fn test_thread_query_after_cursor() {
        let uri: axum::http::Uri = "/api/messages/thread/4?after=2026-10-18T09:30:00Z"
            .parse()
            .expect("uri");
        let Query(query) = Query::<ThreadQuery>::try_from_uri(&uri).expect("query");
        assert!(query.after.is_some());
    }
}
