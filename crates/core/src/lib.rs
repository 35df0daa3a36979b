//! Bazaar Core - marketplace domain types and rules.
//!
//! This crate holds everything about the marketplace that can be expressed
//! without I/O:
//! - [`types`] - ids, email, money, roles and statuses
//! - [`cart`] - the shopping cart carried in a visitor's session
//! - [`workflow`] - line item fulfillment transitions and order summaries
//! - [`session_policy`] - inactivity and maximum-age rules for logins
//! - [`access`] - role-based dashboard access and platform lock gate
//!
//! The `server` and `cli` crates enable the `postgres` feature to get `sqlx`
//! encode/decode impls for the id newtypes and enums.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod access;
pub mod cart;
pub mod session_policy;
pub mod types;
pub mod workflow;

pub use access::{Area, Denial, PlatformFlags, gate};
pub use cart::{Cart, CartError, CartLine, MAX_LINE_QUANTITY};
pub use session_policy::{
    ExpiryKind, InactivityPolicy, PolicyError, SessionEndReason, SessionVerdict,
};
pub use types::*;
pub use workflow::WorkflowError;
