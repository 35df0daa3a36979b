//! Business logic services.
//!
//! - `auth` - Email/password accounts (Argon2id)
//! - `checkout` - Cart to order conversion
//! - `identity` - Identity provider admin API (custom claims)
//! - `markdown` - Content page rendering
//! - `platform` - Cached platform lock flags

pub mod auth;
pub mod checkout;
pub mod identity;
pub mod markdown;
pub mod platform;
