//! Buyer claims against their orders.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Deserialize;
use tracing::{info, instrument};

use bazaar_core::OrderId;

use crate::db::ClaimRepository;
use crate::db::claims::Claim;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

const MAX_REASON_LEN: usize = 200;
const MAX_DETAILS_LEN: usize = 4000;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/claims", get(index).post(create))
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub order_id: OrderId,
    pub reason: String,
    #[serde(default)]
    pub details: String,
}

impl ClaimRequest {
    fn validate(&self) -> Result<()> {
        let reason = self.reason.trim();
        if reason.is_empty() {
            return Err(AppError::BadRequest("a reason is required".to_owned()));
        }
        if reason.chars().count() > MAX_REASON_LEN {
            return Err(AppError::BadRequest(format!(
                "reason must be at most {MAX_REASON_LEN} characters"
            )));
        }
        if self.details.chars().count() > MAX_DETAILS_LEN {
            return Err(AppError::BadRequest(format!(
                "details must be at most {MAX_DETAILS_LEN} characters"
            )));
        }
        Ok(())
    }
}

pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Claim>>> {
    Ok(Json(
        ClaimRepository::new(state.pool())
            .list_for_claimant(user.id)
            .await?,
    ))
}

#[instrument(skip(state, body), fields(claimant_id = %user.id, order_id = %body.order_id))]
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<ClaimRequest>,
) -> Result<(StatusCode, Json<Claim>)> {
    body.validate()?;
    let claim = ClaimRepository::new(state.pool())
        .open(body.order_id, user.id, body.reason.trim(), body.details.trim())
        .await?;
    info!(claim_id = %claim.id, "Claim opened");

    Ok((StatusCode::CREATED, Json(claim)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(reason: &str, details: &str) -> ClaimRequest {
        ClaimRequest {
            order_id: OrderId::new(1),
            reason: reason.to_owned(),
            details: details.to_owned(),
        }
    }

    #[test]
    fn test_claim_validation() {
        assert!(request("Item arrived broken", "").validate().is_ok());
        assert!(request("   ", "photos attached").validate().is_err());
        assert!(request(&"r".repeat(MAX_REASON_LEN + 1), "").validate().is_err());
        assert!(
            request("late", &"d".repeat(MAX_DETAILS_LEN + 1))
                .validate()
                .is_err()
        );
    }
}
