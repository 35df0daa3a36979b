//! Turning a session cart into an order.
//!
//! Prices and titles are re-read from the catalog; the cart's snapshot is only
//! for display. Stock is claimed inside the order transaction.

use rand::Rng;
use sqlx::PgPool;
use thiserror::Error;

use bazaar_core::{Cart, CartError, Money, ProductStatus, UserId};

use crate::db::orders::{NewOrder, NewOrderLine, OrderDetail};
use crate::db::{OrderRepository, ProductRepository, RepositoryError};
use crate::error::AppError;

const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const REFERENCE_SUFFIX_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("\"{0}\" is no longer available")]
    Unavailable(String),
    #[error("you cannot buy your own listing \"{0}\"")]
    OwnListing(String),
    #[error("a shipping address is required")]
    MissingAddress,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart => Self::Cart(CartError::Empty),
            CheckoutError::Unavailable(_) => Self::Conflict(err.to_string()),
            CheckoutError::OwnListing(_) | CheckoutError::MissingAddress => {
                Self::BadRequest(err.to_string())
            }
            CheckoutError::Repository(e) => Self::Database(e),
        }
    }
}

/// Generate a human-friendly order reference such as `BZ-261018-7KQ2XM`.
#[must_use]
pub fn generate_reference(now: chrono::DateTime<chrono::Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..REFERENCE_SUFFIX_LEN)
        .map(|_| {
            let index = rng.random_range(0..REFERENCE_ALPHABET.len());
            char::from(REFERENCE_ALPHABET.get(index).copied().unwrap_or(b'X'))
        })
        .collect();

    format!("BZ-{}-{suffix}", now.format("%y%m%d"))
}

/// Place an order for everything in `cart`.
///
/// # Errors
///
/// Returns `CheckoutError` if the cart is empty, a listing disappeared or is
/// the buyer's own, no shipping address is known, or stock ran out while the
/// order was being written.
pub async fn place_order(
    pool: &PgPool,
    buyer_id: UserId,
    cart: &Cart,
    shipping_address: Option<&str>,
    note: Option<&str>,
) -> Result<OrderDetail, CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    let shipping_address = shipping_address
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or(CheckoutError::MissingAddress)?;

    let products = ProductRepository::new(pool);
    let mut lines = Vec::with_capacity(cart.lines().len());
    for line in cart.lines() {
        let product = products
            .get(line.product_id)
            .await?
            .filter(|p| p.status == ProductStatus::Active)
            .ok_or_else(|| CheckoutError::Unavailable(line.title.clone()))?;

        if product.seller_id == buyer_id {
            return Err(CheckoutError::OwnListing(product.title));
        }
        if product.available() < line.quantity {
            return Err(CheckoutError::Unavailable(product.title));
        }

        lines.push(NewOrderLine {
            product_id: product.id,
            seller_id: product.seller_id,
            title: product.title,
            unit_price: product.price,
            quantity: line.quantity,
        });
    }

    let subtotal: Money = lines.iter().map(|l| l.unit_price.line_total(l.quantity)).sum();
    let mut seller_ids: Vec<UserId> = lines.iter().map(|l| l.seller_id).collect();
    seller_ids.sort_unstable();
    seller_ids.dedup();

    let order = NewOrder {
        reference: generate_reference(chrono::Utc::now()),
        buyer_id,
        seller_ids,
        subtotal,
        shipping_address: shipping_address.to_owned(),
        note: note.map(str::trim).filter(|n| !n.is_empty()).map(str::to_owned),
        lines,
    };

    Ok(OrderRepository::new(pool).create(&order).await?)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_reference_format() {
        let now = chrono::Utc
            .with_ymd_and_hms(2026, 10, 18, 9, 30, 0)
            .single()
            .expect("valid date");
        let reference = generate_reference(now);

        assert!(reference.starts_with("BZ-261018-"));
        let suffix = reference.trim_start_matches("BZ-261018-");
        assert_eq!(suffix.len(), REFERENCE_SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| REFERENCE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_checkout_errors_map_to_client_errors() {
        use axum::http::StatusCode;

        assert_eq!(
            AppError::from(CheckoutError::EmptyCart).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(CheckoutError::Unavailable("Mug".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(CheckoutError::MissingAddress).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
