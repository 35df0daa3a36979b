//! Public catalog: search, product detail and reviews.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use bazaar_core::{ProductId, ReviewId};

use crate::db::products::{Product, ProductQuery};
use crate::db::reviews::{RatingSummary, Review};
use crate::db::{OrderRepository, ProductRepository, ReviewRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

const MAX_REVIEW_LEN: usize = 2000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(search))
        .route("/api/products/categories", get(categories))
        .route("/api/products/{id}", get(show))
        .route(
            "/api/products/{id}/reviews",
            get(list_reviews).post(create_review),
        )
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub products: Vec<Product>,
    pub page: u32,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub rating: RatingSummary,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i16,
    pub body: String,
}

impl ReviewRequest {
    fn validate(&self) -> Result<()> {
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::BadRequest("rating must be between 1 and 5".to_owned()));
        }
        if self.body.chars().count() > MAX_REVIEW_LEN {
            return Err(AppError::BadRequest(format!(
                "review must be at most {MAX_REVIEW_LEN} characters"
            )));
        }
        Ok(())
    }
}

#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<SearchResponse>> {
    if let (Some(min), Some(max)) = (query.min_price, query.max_price)
        && min > max
    {
        return Err(AppError::BadRequest(
            "min_price must not exceed max_price".to_owned(),
        ));
    }

    let products = ProductRepository::new(state.pool()).search(&query).await?;
    Ok(Json(SearchResponse {
        products,
        page: query.page.unwrap_or(1).max(1),
    }))
}

pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    Ok(Json(ProductRepository::new(state.pool()).categories().await?))
}

pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductResponse>> {
    let product = ProductRepository::new(state.pool()).get_active(id).await?;
    let rating = ReviewRepository::new(state.pool()).summary(id).await?;

    Ok(Json(ProductResponse { product, rating }))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Vec<Review>>> {
    ProductRepository::new(state.pool()).get_active(id).await?;
    Ok(Json(
        ReviewRepository::new(state.pool()).list_for_product(id).await?,
    ))
}

/// Review a product. Only buyers with a delivered line item may review.
#[instrument(skip(state, body), fields(author_id = %user.id))]
pub async fn create_review(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(body): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<ReviewId>)> {
    body.validate()?;
    let product = ProductRepository::new(state.pool()).get_active(id).await?;
    if product.seller_id == user.id {
        return Err(AppError::Forbidden("you cannot review your own listing".to_owned()));
    }
    if !OrderRepository::new(state.pool())
        .has_delivered(user.id, id)
        .await?
    {
        return Err(AppError::Forbidden(
            "only buyers who received this product can review it".to_owned(),
        ));
    }

    let review_id = ReviewRepository::new(state.pool())
        .create(id, user.id, body.rating, body.body.trim())
        .await?;
    info!(%review_id, product_id = %id, "Review created");

    Ok((StatusCode::CREATED, Json(review_id)))
}
