//! Status enums for listings, orders and claims.
//!
//! Transition rules live in [`crate::workflow`]; this module only names the
//! states and their database/wire representation.

use serde::{Deserialize, Serialize};

/// Lifecycle of a product listing.
///
/// Sellers create drafts and submit them; editors approve (`active`) or
/// reject. Only `active` listings are visible to shoppers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "product_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Draft,
    PendingReview,
    Active,
    Rejected,
    Archived,
}

impl ProductStatus {
    /// Whether the seller may still edit the listing's details.
    #[must_use]
    pub const fn is_editable(self) -> bool {
        !matches!(self, Self::Archived)
    }

    /// Whether the seller may (re)submit the listing for review.
    #[must_use]
    pub const fn can_submit(self) -> bool {
        matches!(self, Self::Draft | Self::Rejected)
    }
}

/// Fulfillment status of a single order line item.
///
/// Each line belongs to exactly one seller, who moves it through the workflow
/// independently of other sellers' lines in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "item_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

/// Order-level status, summarized from the statuses of its line items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    PartiallyShipped,
    Shipped,
    Delivered,
    Cancelled,
}

/// Status of a buyer claim (dispute) against an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "claim_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    #[default]
    Open,
    InReview,
    Resolved,
    Rejected,
}

impl ClaimStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }
}
