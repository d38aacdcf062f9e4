//! Storage boundary for the catalog, the stock ledger and operator accounts.
//!
//! The traits here are the only way services touch persistent state. Two
//! implementations exist: [`InMemoryInventoryStore`] for tests/dev and
//! [`SqliteInventoryStore`] for real deployments.
//!
//! ## Atomic adjustment
//!
//! [`InventoryStore::apply_adjustment`] is the single write path for stock
//! movements. Implementations must, inside one atomic scope:
//!
//! 1. re-read the product's current stock,
//! 2. evaluate [`plan_adjustment`](stockledger_inventory::plan_adjustment) against that read,
//! 3. append the ledger entry,
//! 4. write the new stock level,
//! 5. commit, or roll everything back on any failure.
//!
//! The sufficiency check and the write must never be split across scopes.

pub mod in_memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use stockledger_auth::UserAccount;
use stockledger_core::{DomainError, ProductId};
use stockledger_inventory::{AdjustmentReceipt, LedgerEntry, StockAdjustment};
use stockledger_products::{Product, ProductDetails};

pub use in_memory::InMemoryInventoryStore;
pub use sqlite::SqliteInventoryStore;

/// Storage operation error.
///
/// Business outcomes decided inside an atomic scope (missing product, SKU
/// collision, insufficient stock) come back as `Domain`; everything else is a
/// backend failure and has already been rolled back.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage failure in {operation}: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn backend(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            message: message.into(),
        }
    }
}

/// A ledger entry joined with the product it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub entry: LedgerEntry,
    pub sku: String,
    pub product_name: String,
}

/// Catalog + ledger persistence.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Insert a new product. SKU collisions are `Conflict`.
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    /// Replace a product's editable fields.
    ///
    /// Unknown id is `NotFound`; a SKU owned by another product is `Conflict`.
    async fn update_product(
        &self,
        id: ProductId,
        details: &ProductDetails,
    ) -> Result<Product, StoreError>;

    /// Remove a product that has no ledger entries.
    ///
    /// Unknown id is `NotFound`; existing history is `Conflict`.
    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// All products, newest first.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Products at or below their minimum, most critical shortage first.
    async fn low_stock_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Atomically append a ledger entry and move the stock counter.
    async fn apply_adjustment(
        &self,
        adjustment: &StockAdjustment,
    ) -> Result<AdjustmentReceipt, StoreError>;

    /// Ledger entries for one product, newest first.
    async fn product_history(&self, id: ProductId) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Most recent ledger entries across all products, newest first.
    async fn recent_history(&self, limit: u32) -> Result<Vec<HistoryEntry>, StoreError>;
}

/// Operator account lookup.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, username: &str) -> Result<Option<UserAccount>, StoreError>;

    /// Insert `user` unless the username is taken. Returns whether it was inserted.
    async fn insert_user_if_absent(&self, user: &UserAccount) -> Result<bool, StoreError>;
}

#[async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        (**self).insert_product(product).await
    }

    async fn update_product(
        &self,
        id: ProductId,
        details: &ProductDetails,
    ) -> Result<Product, StoreError> {
        (**self).update_product(id, details).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        (**self).delete_product(id).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).get_product(id).await
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        (**self).list_products().await
    }

    async fn low_stock_products(&self) -> Result<Vec<Product>, StoreError> {
        (**self).low_stock_products().await
    }

    async fn apply_adjustment(
        &self,
        adjustment: &StockAdjustment,
    ) -> Result<AdjustmentReceipt, StoreError> {
        (**self).apply_adjustment(adjustment).await
    }

    async fn product_history(&self, id: ProductId) -> Result<Vec<LedgerEntry>, StoreError> {
        (**self).product_history(id).await
    }

    async fn recent_history(&self, limit: u32) -> Result<Vec<HistoryEntry>, StoreError> {
        (**self).recent_history(limit).await
    }
}

#[async_trait]
impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    async fn find_user(&self, username: &str) -> Result<Option<UserAccount>, StoreError> {
        (**self).find_user(username).await
    }

    async fn insert_user_if_absent(&self, user: &UserAccount) -> Result<bool, StoreError> {
        (**self).insert_user_if_absent(user).await
    }
}
