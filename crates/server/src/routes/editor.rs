//! Editor dashboard: listing review and review moderation.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use bazaar_core::{ProductId, ReviewId};

use crate::db::products::Product;
use crate::db::{ActivityRepository, ProductRepository, ReviewRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireEditor;
use crate::state::AppState;

const MAX_REASON_LEN: usize = 1000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/editor/products/pending", get(pending))
        .route("/api/editor/products/{id}/approve", post(approve))
        .route("/api/editor/products/{id}/reject", post(reject))
        .route("/api/editor/reviews/{id}", delete(delete_review))
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

/// The rejection reason shown to the seller; required.
fn rejection_reason(body: &RejectRequest) -> Result<&str> {
    let reason = body.reason.trim();
    if reason.is_empty() {
        return Err(AppError::BadRequest(
            "a reason is required to reject a listing".to_owned(),
        ));
    }
    if reason.chars().count() > MAX_REASON_LEN {
        return Err(AppError::BadRequest(format!(
            "reason must be at most {MAX_REASON_LEN} characters"
        )));
    }
    Ok(reason)
}

pub async fn pending(
    RequireEditor(_user): RequireEditor,
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(
        ProductRepository::new(state.pool())
            .list_pending_review()
            .await?,
    ))
}

#[instrument(skip(state), fields(editor_id = %user.id))]
pub async fn approve(
    RequireEditor(user): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.pool())
        .review(id, true, None)
        .await?;
    ActivityRepository::new(state.pool())
        .record_or_warn(Some(user.id), "approve", "product", Some(id.to_string()), json!({}))
        .await;
    info!(product_id = %id, "Listing approved");

    Ok(Json(product))
}

#[instrument(skip(state, body), fields(editor_id = %user.id))]
pub async fn reject(
    RequireEditor(user): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(body): Json<RejectRequest>,
) -> Result<Json<Product>> {
    let reason = rejection_reason(&body)?;
    let product = ProductRepository::new(state.pool())
        .review(id, false, Some(reason))
        .await?;
    ActivityRepository::new(state.pool())
        .record_or_warn(
            Some(user.id),
            "reject",
            "product",
            Some(id.to_string()),
            json!({ "reason": reason }),
        )
        .await;
    info!(product_id = %id, "Listing rejected");

    Ok(Json(product))
}

#[instrument(skip(state), fields(editor_id = %user.id))]
pub async fn delete_review(
    RequireEditor(user): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
) -> Result<StatusCode> {
    let product_id = ReviewRepository::new(state.pool()).delete(id).await?;
    ActivityRepository::new(state.pool())
        .record_or_warn(
            Some(user.id),
            "delete",
            "review",
            Some(id.to_string()),
            json!({ "product_id": product_id }),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_needs_reason() {
        let blank = RejectRequest {
            reason: "   ".to_owned(),
        };
        assert!(rejection_reason(&blank).is_err());

        let given = RejectRequest {
            reason: " Photos missing ".to_owned(),
        };
        assert_eq!(rejection_reason(&given).expect("valid"), "Photos missing");
    }
}
