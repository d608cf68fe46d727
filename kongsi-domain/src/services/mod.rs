pub mod settlement_engine;
pub mod settlement_rounding;
pub mod share_allocator;

pub use settlement_engine::settle;
pub use settlement_rounding::{RoundingMode, SettlementContext};
pub use share_allocator::{owner_weights, resolve_persons, split_by_weights};
