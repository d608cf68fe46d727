#![warn(clippy::uninlined_format_args)]

pub mod error;
pub mod model;
pub mod services;

pub use error::{InvalidBillReason, SettleError};
pub use model::{
    Adjustment, AdjustmentKind, AdjustmentShare, Bill, BillSettlement, ItemShare, LineItem, Money,
    Owner, PersonSettlement,
};
pub use services::{settle, RoundingMode, SettlementContext};
