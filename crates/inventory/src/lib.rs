//! Inventory domain module: the stock ledger.
//!
//! This crate contains the rules for stock movements (direction, quantity
//! bounds, sufficiency) and the append-only ledger entry type, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod ledger;

pub use ledger::{
    AdjustmentReceipt, LedgerEntry, MAX_QUANTITY, Quantity, StockAdjustment, StockDirection,
    ledger_balance, plan_adjustment,
};
