//! Infrastructure layer: storage backends, the stock service and CSV export.

pub mod export;
pub mod service;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use export::{EXPORT_HEADERS, escape_field, render_products_csv};
pub use service::{DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT, ServiceError, StockService};
pub use store::{
    HistoryEntry, InMemoryInventoryStore, InventoryStore, SqliteInventoryStore, StoreError,
    UserStore,
};
