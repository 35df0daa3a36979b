//! Checkout: turn the session cart into an order.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument};

use bazaar_core::{Area, Cart, gate};

use crate::db::ProfileRepository;
use crate::db::orders::OrderDetail;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::checkout::place_order;
use crate::state::AppState;

use super::cart::{load_cart, save_cart};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/checkout", post(checkout))
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    /// Defaults to the address saved on the profile.
    pub shipping_address: Option<String>,
    pub note: Option<String>,
}

#[instrument(skip(state, session, body), fields(buyer_id = %user.id))]
pub async fn checkout(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderDetail>)> {
    let flags = state.platform().flags().await?;
    gate(Some(user.role), Area::Checkout, &flags)?;

    let cart = load_cart(&session).await;
    let saved_address = match body.shipping_address {
        Some(_) => None,
        None => ProfileRepository::new(state.pool())
            .get_by_id(user.id)
            .await?
            .and_then(|p| p.shipping_address),
    };
    let address = body.shipping_address.as_deref().or(saved_address.as_deref());

    let order = place_order(state.pool(), user.id, &cart, address, body.note.as_deref()).await?;
    save_cart(&session, &Cart::new()).await?;

    info!(
        order_id = %order.order.id,
        reference = %order.order.reference,
        sellers = order.order.seller_ids.len(),
        "Order placed"
    );
    Ok((StatusCode::CREATED, Json(order)))
}
