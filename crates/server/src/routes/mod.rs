//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /api/platform/status              - Public platform flags
//!
//! # Auth (strict rate limit)
//! POST /api/auth/register | login | logout
//! GET  /api/auth/me
//! POST /set-claims                       - Identity provider role claims
//!
//! # Catalog
//! GET  /api/products                     - Search (q, category, seller, price, sort, page)
//! GET  /api/products/categories
//! GET  /api/products/{id}                - Detail with rating summary
//! GET  /api/products/{id}/reviews        POST (delivered buyers only)
//! GET  /api/pages/{slug}   GET /api/banners
//!
//! # Cart and checkout
//! GET  /api/cart   DELETE /api/cart
//! POST /api/cart/items   PATCH|DELETE /api/cart/items/{product}
//! POST /api/checkout
//!
//! # Account (signed in)
//! GET|PATCH /api/profile
//! GET  /api/orders   GET /api/orders/{id}   POST /api/orders/{id}/cancel
//! GET|POST /api/claims
//! GET|POST /api/messages   GET /api/messages/thread/{user}?after=
//! POST /api/messages/thread/{user}/read
//!
//! # Dashboards
//! /api/seller/...    - RequireSeller
//! /api/editor/...    - RequireEditor
//! /api/content/...   - RequireContentManager
//! /api/admin/...     - RequireAdmin
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod claims;
pub mod content;
pub mod editor;
pub mod messages;
pub mod orders;
pub mod pages;
pub mod platform;
pub mod products;
pub mod profile;
pub mod seller;
pub mod set_claims;

use axum::Router;

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Routes that take credentials.
pub fn credential_routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(set_claims::router())
}

/// Everything else under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(platform::router())
        .merge(auth::me_router())
        .merge(profile::router())
        .merge(products::router())
        .merge(pages::router())
        .merge(cart::router())
        .merge(checkout::router())
        .merge(orders::router())
        .merge(claims::router())
        .merge(messages::router())
        .merge(seller::router())
        .merge(editor::router())
        .merge(content::router())
        .merge(admin::router())
}

/// Create all routes, each group behind its rate limiter.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(credential_routes().layer(auth_rate_limiter()))
        .merge(api_routes().layer(api_rate_limiter()))
}
