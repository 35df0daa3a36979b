//! Bazaar marketplace server library.
//!
//! The HTTP API behind the marketplace: catalog and search, cart and
//! checkout, order fulfillment, messaging, reviews, claims, staff dashboards,
//! platform locks and the custom-claims endpoint. Exposed as a library so the
//! CLI can reuse the repositories and the tests can reach the internals.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
