//! Session cart.
//!
//! The cart lives in the cookie session, so anonymous visitors can fill one
//! and keep it through login. Quantities are clamped to current stock on
//! every change.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::{Cart, CartLine, Money, ProductId, ProductStatus};

use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::models::session_keys;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/cart", get(show).delete(clear))
        .route("/api/cart/items", axum::routing::post(add))
        .route("/api/cart/items/{product}", patch(set_quantity).delete(remove))
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub subtotal: Money,
    pub item_count: u32,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            lines: cart.lines().to_vec(),
            subtotal: cart.subtotal(),
            item_count: cart.item_count(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: u32,
}

const fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: u32,
}

/// Load the cart from the session. A missing or unreadable cart is empty.
pub async fn load_cart(session: &Session) -> Cart {
    match session.get::<Cart>(session_keys::CART).await {
        Ok(cart) => cart.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Discarding unreadable cart");
            Cart::new()
        }
    }
}

/// # Errors
///
/// Returns an error if the session cannot be written.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<()> {
    session.insert(session_keys::CART, cart).await?;
    Ok(())
}

pub async fn show(session: Session) -> Json<CartView> {
    Json(CartView::from(&load_cart(&session).await))
}

#[instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<CartView>> {
    let product = ProductRepository::new(state.pool())
        .get_active(body.product_id)
        .await?;
    if user.is_some_and(|u| u.id == product.seller_id) {
        return Err(AppError::BadRequest(
            "you cannot add your own listing to the cart".to_owned(),
        ));
    }

    let mut cart = load_cart(&session).await;
    let stock = product.available();
    cart.add(
        CartLine {
            product_id: product.id,
            seller_id: product.seller_id,
            title: product.title,
            unit_price: product.price,
            quantity: body.quantity,
        },
        stock,
    )?;
    save_cart(&session, &cart).await?;

    Ok(Json(CartView::from(&cart)))
}

#[instrument(skip(state, session))]
pub async fn set_quantity(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<ProductId>,
    Json(body): Json<QuantityRequest>,
) -> Result<Json<CartView>> {
    let stock = ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .filter(|p| p.status == ProductStatus::Active)
        .map_or(0, |p| p.available());

    let mut cart = load_cart(&session).await;
    cart.set_quantity(product_id, body.quantity, stock)?;
    save_cart(&session, &cart).await?;

    Ok(Json(CartView::from(&cart)))
}

pub async fn remove(
    session: Session,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await;
    cart.remove(product_id)?;
    save_cart(&session, &cart).await?;

    Ok(Json(CartView::from(&cart)))
}

pub async fn clear(session: Session) -> Result<Json<CartView>> {
    let cart = Cart::new();
    save_cart(&session, &cart).await?;
    Ok(Json(CartView::from(&cart)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::UserId;

    #[test]
    fn test_add_request_defaults_to_one() {
        let body: AddItemRequest =
            serde_json::from_str(r#"{"product_id": 12}"#).expect("valid body");
        assert_eq!(body.product_id, ProductId::new(12));
        assert_eq!(body.quantity, 1);
    }

    #[test]
    fn test_cart_view_totals() {
        let mut cart = Cart::new();
        cart.add(
            CartLine {
                product_id: ProductId::new(1),
                seller_id: UserId::new(9),
                title: "Mug".to_owned(),
                unit_price: Money::from_cents(1250),
                quantity: 2,
            },
            10,
        )
        .expect("in stock");

        let view = CartView::from(&cart);
        assert_eq!(view.item_count, 2);
        assert_eq!(view.subtotal, Money::from_cents(2500));
        assert_eq!(view.lines.len(), 1);
    }
}
