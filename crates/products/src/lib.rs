//! Products domain module.
//!
//! This crate contains business rules for the product catalog (field
//! validation, low-stock classification), implemented purely as deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod product;

pub use product::{
    DEFAULT_MIN_STOCK, Product, ProductDetails, by_criticality, low_stock_report,
};
