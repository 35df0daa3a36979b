//! Seller dashboard: listings and fulfillment of the seller's own line items.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};
use url::Url;

use bazaar_core::{ItemStatus, Money, OrderId, OrderItemId, ProductId, ProductStatus};

use crate::db::orders::{Fulfiller, OrderDetail, SellerSales};
use crate::db::products::{Product, ProductInput, ProductPatch};
use crate::db::{ActivityRepository, OrderRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireSeller;
use crate::state::AppState;

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 10_000;
const MAX_STOCK: u32 = 100_000;
/// Highest listing price, in cents.
const MAX_PRICE_CENTS: i64 = 100_000_000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/seller/dashboard", get(dashboard))
        .route("/api/seller/products", get(list_products).post(create_product))
        .route(
            "/api/seller/products/{id}",
            patch(update_product).delete(archive_product),
        )
        .route("/api/seller/products/{id}/submit", post(submit_product))
        .route("/api/seller/orders", get(list_orders))
        .route(
            "/api/seller/orders/{order}/items/{item}/status",
            post(update_item_status),
        )
}

// =============================================================================
// Validation
// =============================================================================

fn check_title(title: &str) -> Result<()> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::BadRequest(format!(
            "title must be 1 to {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

fn check_description(description: &str) -> Result<()> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(AppError::BadRequest(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

fn check_price(price: Money) -> Result<()> {
    if price.is_zero() {
        return Err(AppError::BadRequest("price must be greater than zero".to_owned()));
    }
    let max = Decimal::new(MAX_PRICE_CENTS, 2);
    if price.amount() > max {
        return Err(AppError::BadRequest(format!("price must be at most {max}")));
    }
    Ok(())
}

fn check_stock(stock: u32) -> Result<()> {
    if stock > MAX_STOCK {
        return Err(AppError::BadRequest(format!("stock must be at most {MAX_STOCK}")));
    }
    Ok(())
}

fn check_image_url(image_url: &str) -> Result<()> {
    match Url::parse(image_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(AppError::BadRequest(
            "image_url must be an http(s) URL".to_owned(),
        )),
    }
}

fn validate_input(input: &ProductInput) -> Result<()> {
    check_title(&input.title)?;
    check_description(&input.description)?;
    check_price(input.price)?;
    check_stock(input.stock)?;
    input.image_url.as_deref().map_or(Ok(()), check_image_url)
}

fn validate_patch(patch: &ProductPatch) -> Result<()> {
    patch.title.as_deref().map_or(Ok(()), check_title)?;
    patch.description.as_deref().map_or(Ok(()), check_description)?;
    patch.price.map_or(Ok(()), check_price)?;
    patch.stock.map_or(Ok(()), check_stock)?;
    patch.image_url.as_deref().map_or(Ok(()), check_image_url)
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SellerDashboard {
    pub products_by_status: HashMap<ProductStatus, i64>,
    pub sales: SellerSales,
}

pub async fn dashboard(
    RequireSeller(user): RequireSeller,
    State(state): State<AppState>,
) -> Result<Json<SellerDashboard>> {
    let products_by_status = ProductRepository::new(state.pool())
        .count_by_status(Some(user.id))
        .await?
        .into_iter()
        .collect();
    let sales = OrderRepository::new(state.pool())
        .seller_sales(user.id)
        .await?;

    Ok(Json(SellerDashboard {
        products_by_status,
        sales,
    }))
}

pub async fn list_products(
    RequireSeller(user): RequireSeller,
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(
        ProductRepository::new(state.pool())
            .list_for_seller(user.id)
            .await?,
    ))
}

#[instrument(skip(state, body), fields(seller_id = %user.id))]
pub async fn create_product(
    RequireSeller(user): RequireSeller,
    State(state): State<AppState>,
    Json(body): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    validate_input(&body)?;
    let product = ProductRepository::new(state.pool())
        .create(user.id, &body)
        .await?;
    info!(product_id = %product.id, "Listing created");

    Ok((StatusCode::CREATED, Json(product)))
}

/// Edit a listing. Content changes to a live listing send it back to draft.
#[instrument(skip(state, body), fields(seller_id = %user.id))]
pub async fn update_product(
    RequireSeller(user): RequireSeller,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductPatch>,
) -> Result<Json<Product>> {
    validate_patch(&body)?;
    let product = ProductRepository::new(state.pool())
        .update(id, user.id, &body)
        .await?;

    Ok(Json(product))
}

#[instrument(skip(state), fields(seller_id = %user.id))]
pub async fn archive_product(
    RequireSeller(user): RequireSeller,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool())
        .archive(id, user.id)
        .await?;
    ActivityRepository::new(state.pool())
        .record_or_warn(Some(user.id), "archive", "product", Some(id.to_string()), json!({}))
        .await;

    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state), fields(seller_id = %user.id))]
pub async fn submit_product(
    RequireSeller(user): RequireSeller,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.pool())
        .submit(id, user.id)
        .await?;
    ActivityRepository::new(state.pool())
        .record_or_warn(Some(user.id), "submit", "product", Some(id.to_string()), json!({}))
        .await;

    Ok(Json(product))
}

#[derive(Debug, Default, Deserialize)]
pub struct SellerOrdersQuery {
    pub status: Option<ItemStatus>,
    pub page: Option<u32>,
}

/// Orders containing the seller's items. Each order only carries the
/// seller's own lines.
pub async fn list_orders(
    RequireSeller(user): RequireSeller,
    State(state): State<AppState>,
    Query(query): Query<SellerOrdersQuery>,
) -> Result<Json<Vec<OrderDetail>>> {
    Ok(Json(
        OrderRepository::new(state.pool())
            .list_for_seller(user.id, query.status, query.page)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ItemStatusRequest {
    pub status: ItemStatus,
    pub tracking_number: Option<String>,
}

impl ItemStatusRequest {
    /// Tracking number, trimmed, only accepted when marking as shipped.
    pub(crate) fn tracking(&self) -> Result<Option<&str>> {
        let tracking = self
            .tracking_number
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        match tracking {
            Some(t) if self.status != ItemStatus::Shipped => Err(AppError::BadRequest(format!(
                "tracking number \"{t}\" can only be set when shipping"
            ))),
            Some(t) if t.len() > 100 => Err(AppError::BadRequest(
                "tracking number is too long".to_owned(),
            )),
            other => Ok(other),
        }
    }
}

#[instrument(skip(state, body), fields(seller_id = %user.id, status = ?body.status))]
pub async fn update_item_status(
    RequireSeller(user): RequireSeller,
    State(state): State<AppState>,
    Path((order_id, item_id)): Path<(OrderId, OrderItemId)>,
    Json(body): Json<ItemStatusRequest>,
) -> Result<Json<OrderDetail>> {
    let tracking = body.tracking()?;
    let order = OrderRepository::new(state.pool())
        .update_item_status(
            order_id,
            item_id,
            Fulfiller::Seller(user.id),
            body.status,
            tracking,
        )
        .await?;
    info!(%order_id, %item_id, order_status = ?order.order.status, "Item status updated");

    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ProductInput {
        ProductInput {
            title: "Walnut desk lamp".to_owned(),
            description: "Hand-turned".to_owned(),
            category: Some("lighting".to_owned()),
            price: Money::from_cents(4900),
            stock: 3,
            image_url: Some("https://cdn.bazaar.test/lamp.jpg".to_owned()),
        }
    }

    #[test]
    fn test_valid_listing() {
        assert!(validate_input(&input()).is_ok());
    }

    #[test]
    fn test_listing_rules() {
        let blank_title = ProductInput {
            title: "  ".to_owned(),
            ..input()
        };
        assert!(validate_input(&blank_title).is_err());

        let free = ProductInput {
            price: Money::from_cents(0),
            ..input()
        };
        assert!(validate_input(&free).is_err());

        let bad_image = ProductInput {
            image_url: Some("javascript:alert(1)".to_owned()),
            ..input()
        };
        assert!(validate_input(&bad_image).is_err());

        let hoard = ProductInput {
            stock: MAX_STOCK + 1,
            ..input()
        };
        assert!(validate_input(&hoard).is_err());
    }

    #[test]
    fn test_price_upper_bound() {
        let top = ProductInput {
            price: Money::parse("1000000.00").expect("valid"),
            ..input()
        };
        assert!(validate_input(&top).is_ok());

        let over = ProductInput {
            price: Money::parse("1000000.01").expect("valid"),
            ..input()
        };
        assert!(matches!(validate_input(&over), Err(AppError::BadRequest(_))));

        let overflowing = ProductInput {
            price: Money::parse("100000000000").expect("valid"),
            ..input()
        };
        assert!(validate_input(&overflowing).is_err());

        let patch = ProductPatch {
            price: Some(Money::parse("5000000").expect("valid")),
            ..ProductPatch::default()
        };
        assert!(validate_patch(&patch).is_err());
    }

    #[test]
    fn test_empty_patch_is_valid() {
        assert!(validate_patch(&ProductPatch::default()).is_ok());
    }

    #[test]
    fn test_tracking_only_when_shipping() {
        let shipped = ItemStatusRequest {
            status: ItemStatus::Shipped,
            tracking_number: Some(" 1Z999 ".to_owned()),
        };
        assert_eq!(shipped.tracking().expect("valid"), Some("1Z999"));

        let processing = ItemStatusRequest {
            status: ItemStatus::Processing,
            tracking_number: Some("1Z999".to_owned()),
        };
        assert!(processing.tracking().is_err());

        let blank = ItemStatusRequest {
            status: ItemStatus::Delivered,
            tracking_number: Some("  ".to_owned()),
        };
        assert_eq!(blank.tracking().expect("valid"), None);
    }
}
