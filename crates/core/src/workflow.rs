//! Seller order workflow.
//!
//! Line items move forward through
//! `pending -> processing -> shipped -> delivered`; a line can be cancelled
//! while it is still `pending` or `processing`. The order's own status is a
//! summary recomputed from its lines after every change.

use thiserror::Error;

use crate::types::{ClaimStatus, ItemStatus, OrderStatus};

/// A rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("cannot move line item from {from:?} to {to:?}")]
    InvalidItemTransition { from: ItemStatus, to: ItemStatus },
    #[error("cannot move claim from {from:?} to {to:?}")]
    InvalidClaimTransition { from: ClaimStatus, to: ClaimStatus },
    #[error("no line items can be cancelled")]
    NothingToCancel,
}

impl ItemStatus {
    /// Whether a seller may move a line item from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use ItemStatus::{Cancelled, Delivered, Pending, Processing, Shipped};
        matches!(
            (self, next),
            (Pending, Processing | Shipped | Cancelled)
                | (Processing, Shipped | Cancelled)
                | (Shipped, Delivered)
        )
    }

    /// Check a transition, returning a descriptive error when it is invalid.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidItemTransition`].
    pub const fn transition_to(self, next: Self) -> Result<Self, WorkflowError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(WorkflowError::InvalidItemTransition {
                from: self,
                to: next,
            })
        }
    }

    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    const fn has_shipped(self) -> bool {
        matches!(self, Self::Shipped | Self::Delivered)
    }
}

impl OrderStatus {
    /// Summarize an order from its line item statuses.
    #[must_use]
    pub fn summarize(items: &[ItemStatus]) -> Self {
        let live: Vec<ItemStatus> = items
            .iter()
            .copied()
            .filter(|s| *s != ItemStatus::Cancelled)
            .collect();

        if items.is_empty() {
            return Self::Pending;
        }
        if live.is_empty() {
            return Self::Cancelled;
        }
        if live.iter().all(|s| *s == ItemStatus::Delivered) {
            return Self::Delivered;
        }
        if live.iter().all(|s| s.has_shipped()) {
            return Self::Shipped;
        }
        if live.iter().any(|s| s.has_shipped()) {
            return Self::PartiallyShipped;
        }
        if live.iter().all(|s| *s == ItemStatus::Pending) {
            return Self::Pending;
        }
        Self::Processing
    }
}

/// Which line items a buyer-initiated cancellation affects.
///
/// Buyers can only withdraw lines no seller has started working on.
///
/// # Errors
///
/// Returns [`WorkflowError::NothingToCancel`] if every line is past `pending`.
pub fn buyer_cancellable<T: Copy>(
    items: &[(T, ItemStatus)],
) -> Result<Vec<T>, WorkflowError> {
    let ids: Vec<T> = items
        .iter()
        .filter(|(_, status)| *status == ItemStatus::Pending)
        .map(|(id, _)| *id)
        .collect();

    if ids.is_empty() {
        Err(WorkflowError::NothingToCancel)
    } else {
        Ok(ids)
    }
}

impl ClaimStatus {
    /// Whether staff may move a claim from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use ClaimStatus::{InReview, Open, Rejected, Resolved};
        matches!(
            (self, next),
            (Open, InReview | Resolved | Rejected) | (InReview, Resolved | Rejected)
        )
    }

    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidClaimTransition`].
    pub const fn transition_to(self, next: Self) -> Result<Self, WorkflowError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(WorkflowError::InvalidClaimTransition {
                from: self,
                to: next,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ItemStatus::{Cancelled, Delivered, Pending, Processing, Shipped};

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Shipped));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
    }

    #[test]
    fn test_backward_and_same_transitions_rejected() {
        assert!(!Shipped.can_transition_to(Processing));
        assert!(!Delivered.can_transition_to(Shipped));
        assert!(!Processing.can_transition_to(Processing));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn test_cancellation_only_before_shipping() {
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Cancelled));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert_eq!(
            Delivered.transition_to(Cancelled),
            Err(WorkflowError::InvalidItemTransition {
                from: Delivered,
                to: Cancelled
            })
        );
    }

    #[test]
    fn test_summarize() {
        let cases: &[(&[ItemStatus], OrderStatus)] = &[
            (&[], OrderStatus::Pending),
            (&[Pending, Pending], OrderStatus::Pending),
            (&[Pending, Processing], OrderStatus::Processing),
            (&[Pending, Shipped], OrderStatus::PartiallyShipped),
            (&[Shipped, Delivered], OrderStatus::Shipped),
            (&[Delivered, Delivered], OrderStatus::Delivered),
            (&[Delivered, Cancelled], OrderStatus::Delivered),
            (&[Shipped, Cancelled], OrderStatus::Shipped),
            (&[Cancelled, Cancelled], OrderStatus::Cancelled),
            (&[Pending, Cancelled], OrderStatus::Pending),
        ];

        for (items, expected) in cases {
            assert_eq!(OrderStatus::summarize(items), *expected, "items: {items:?}");
        }
    }

    #[test]
    fn test_buyer_cancellable_picks_pending_lines() {
        let items = [(1, Pending), (2, Processing), (3, Pending)];
        assert_eq!(buyer_cancellable(&items), Ok(vec![1, 3]));

        let shipped = [(1, Shipped)];
        assert_eq!(
            buyer_cancellable(&shipped),
            Err(WorkflowError::NothingToCancel)
        );
    }

    #[test]
    fn test_claim_transitions() {
        assert!(ClaimStatus::Open.can_transition_to(ClaimStatus::InReview));
        assert!(ClaimStatus::InReview.can_transition_to(ClaimStatus::Resolved));
        assert!(!ClaimStatus::Resolved.can_transition_to(ClaimStatus::Open));
        assert!(!ClaimStatus::InReview.can_transition_to(ClaimStatus::Open));
    }
}
