use thiserror::Error;

use crate::model::Money;

/// Precondition violations in a [`crate::model::Bill`]. The settlement
/// engine rejects the whole call on the first violation found.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidBillReason {
    #[error("bill has no items")]
    EmptyItems,
    #[error("item '{description}' has no owners")]
    UnownedItem { description: String },
    #[error("item '{description}' has a negative price")]
    NegativePrice { description: String },
    #[error("item '{description}' has a negative weight for owner '{owner}'")]
    NegativeWeight { description: String, owner: String },
    #[error("item '{description}' has owner weights summing to zero")]
    ZeroWeightSum { description: String },
    #[error("adjustment #{index} has a negative amount")]
    NegativeAmount { index: usize },
    #[error("adjustment #{index} supplies neither an amount nor a rate")]
    MissingAmountAndRate { index: usize },
    #[error("adjustment #{index} has a negative rate")]
    NegativeRate { index: usize },
    #[error("adjustment #{index} has a discount rate above 1")]
    RateAboveOne { index: usize },
}

/// Errors returned by [`crate::services::settle`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettleError {
    #[error("invalid bill: {0}")]
    InvalidBill(#[from] InvalidBillReason),
    /// A flat adjustment exists but no persons could be resolved.
    #[error("no persons to allocate shared costs to")]
    EmptyPersonSet,
    /// Internal invariant violation: rounded per-person totals failed
    /// to reconcile with the bill total even after residue repair.
    #[error("rounded totals failed to reconcile (expected {expected}, got {actual})")]
    RoundingReconciliation { expected: Money, actual: Money },
}
