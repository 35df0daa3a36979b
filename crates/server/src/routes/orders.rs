//! The buyer's own orders.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use tracing::{info, instrument};

use bazaar_core::OrderId;

use crate::db::OrderRepository;
use crate::db::orders::{Order, OrderDetail};
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(index))
        .route("/api/orders/{id}", get(show))
        .route("/api/orders/{id}/cancel", post(cancel))
}

pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(
        OrderRepository::new(state.pool())
            .list_for_buyer(user.id)
            .await?,
    ))
}

pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    Ok(Json(
        OrderRepository::new(state.pool())
            .get_for_buyer(id, user.id)
            .await?,
    ))
}

/// Cancel every line of the order no seller has started on.
#[instrument(skip(state), fields(buyer_id = %user.id))]
pub async fn cancel(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let order = OrderRepository::new(state.pool())
        .cancel_by_buyer(id, user.id)
        .await?;
    info!(order_id = %id, status = ?order.order.status, "Order cancelled by buyer");

    Ok(Json(order))
}
