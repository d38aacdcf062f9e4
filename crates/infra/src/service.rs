//! Stock service (application-level orchestration).
//!
//! Sits between the HTTP layer and an [`InventoryStore`]:
//!
//! ```text
//! request
//!   ↓
//! 1. Validate input (quantity bounds, product fields)
//!   ↓
//! 2. Delegate to the store (atomic for stock adjustments)
//!   ↓
//! 3. Log the outcome, map errors into ServiceError
//! ```
//!
//! The service holds no state of its own; every decision about current stock
//! is made by the store inside its atomic scope.

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use stockledger_core::{DomainError, ProductId};
use stockledger_inventory::{
    AdjustmentReceipt, LedgerEntry, Quantity, StockAdjustment, StockDirection,
};
use stockledger_products::{Product, ProductDetails};

use crate::export::render_products_csv;
use crate::store::{HistoryEntry, InventoryStore, StoreError};

/// Rows returned by the global history view when the caller asks for no limit.
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

/// Upper bound for the global history view.
pub const MAX_HISTORY_LIMIT: u32 = 1000;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Deterministic rejection: bad input, unknown product, conflict, shortage.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Storage failed; nothing was committed.
    #[error("storage error: {0}")]
    Store(String),
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Domain(e) => Self::Domain(e),
            other @ StoreError::Backend { .. } => Self::Store(other.to_string()),
        }
    }
}

/// Product catalog and stock ledger operations.
#[derive(Debug, Clone)]
pub struct StockService<S> {
    store: S,
}

impl<S: InventoryStore> StockService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Move `quantity` units in or out of a product's stock.
    ///
    /// Returns the new ledger entry id and the resulting stock level.
    #[instrument(skip(self, notes), fields(product_id = %product_id, direction = %direction))]
    pub async fn adjust_stock(
        &self,
        product_id: ProductId,
        direction: StockDirection,
        quantity: i64,
        notes: Option<String>,
    ) -> Result<AdjustmentReceipt, ServiceError> {
        let quantity = Quantity::new(quantity).inspect_err(|e| warn!(error = %e, "rejected adjustment"))?;
        let adjustment = StockAdjustment {
            product_id,
            direction,
            quantity,
            notes: notes.unwrap_or_default(),
        };

        match self.store.apply_adjustment(&adjustment).await {
            Ok(receipt) => {
                info!(
                    transaction_id = %receipt.transaction_id,
                    quantity = quantity.get(),
                    new_stock = receipt.new_stock,
                    "stock adjusted"
                );
                Ok(receipt)
            }
            Err(e) => Err(self.log_failure("adjust_stock", e)),
        }
    }

    #[instrument(skip(self, details), fields(sku = %details.sku))]
    pub async fn create_product(&self, details: ProductDetails) -> Result<Product, ServiceError> {
        let product = Product::create(ProductId::new(), details, Utc::now())
            .inspect_err(|e| warn!(error = %e, "rejected product"))?;

        self.store
            .insert_product(&product)
            .await
            .map_err(|e| self.log_failure("create_product", e))?;

        info!(product_id = %product.id_typed(), "product created");
        Ok(product)
    }

    /// Replace a product's editable fields.
    ///
    /// A changed `current_stock` is accepted as a baseline correction: it is
    /// not recorded in the ledger, so it is logged.
    #[instrument(skip(self, details), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: ProductId,
        details: ProductDetails,
    ) -> Result<Product, ServiceError> {
        let details = details
            .validated()
            .inspect_err(|e| warn!(error = %e, "rejected product update"))?;
        let existing = self.get_product(id).await?;

        let updated = self
            .store
            .update_product(id, &details)
            .await
            .map_err(|e| self.log_failure("update_product", e))?;

        if existing.current_stock() != updated.current_stock() {
            warn!(
                previous = existing.current_stock(),
                current = updated.current_stock(),
                "stock baseline corrected outside the ledger"
            );
        }
        info!("product updated");
        Ok(updated)
    }

    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), ServiceError> {
        self.store
            .delete_product(id)
            .await
            .map_err(|e| self.log_failure("delete_product", e))?;
        info!("product deleted");
        Ok(())
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, ServiceError> {
        self.store
            .get_product(id)
            .await
            .map_err(|e| self.log_failure("get_product", e))?
            .ok_or_else(|| DomainError::not_found("product").into())
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, ServiceError> {
        self.store
            .list_products()
            .await
            .map_err(|e| self.log_failure("list_products", e))
    }

    /// Products at or below their minimum, most critical first.
    pub async fn low_stock_alerts(&self) -> Result<Vec<Product>, ServiceError> {
        self.store
            .low_stock_products()
            .await
            .map_err(|e| self.log_failure("low_stock_alerts", e))
    }

    pub async fn product_history(&self, id: ProductId) -> Result<Vec<LedgerEntry>, ServiceError> {
        self.get_product(id).await?;
        self.store
            .product_history(id)
            .await
            .map_err(|e| self.log_failure("product_history", e))
    }

    /// Newest ledger entries across all products.
    ///
    /// `None` means [`DEFAULT_HISTORY_LIMIT`]; larger requests are capped at
    /// [`MAX_HISTORY_LIMIT`].
    pub async fn recent_history(&self, limit: Option<u32>) -> Result<Vec<HistoryEntry>, ServiceError> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        self.store
            .recent_history(limit)
            .await
            .map_err(|e| self.log_failure("recent_history", e))
    }

    /// Full catalog as CSV, newest product first.
    #[instrument(skip(self))]
    pub async fn export_csv(&self) -> Result<String, ServiceError> {
        let products = self.list_products().await?;
        info!(rows = products.len(), "catalog exported");
        Ok(render_products_csv(&products))
    }

    fn log_failure(&self, operation: &'static str, err: StoreError) -> ServiceError {
        match &err {
            StoreError::Domain(e) => warn!(operation, error = %e, "request rejected"),
            StoreError::Backend { .. } => error!(operation, error = %err, "storage failure"),
        }
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryInventoryStore;

    fn details(sku: &str, stock: i64) -> ProductDetails {
        ProductDetails {
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            description: String::new(),
            category: String::new(),
            current_stock: stock,
            min_stock: 5,
        }
    }

    fn service() -> StockService<InMemoryInventoryStore> {
        StockService::new(InMemoryInventoryStore::new())
    }

    #[tokio::test]
    async fn quantity_bounds_are_checked_before_the_store() {
        let svc = service();
        let p = svc.create_product(details("A1", 10)).await.unwrap();

        for bad in [0, -1, 100_001] {
            let err = svc
                .adjust_stock(p.id_typed(), StockDirection::In, bad, None)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))), "{bad}");
        }
        assert!(svc.product_history(p.id_typed()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let svc = service();
        let missing = ProductId::new();

        let err = svc
            .adjust_stock(missing, StockDirection::In, 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));

        let err = svc.product_history(missing).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_can_correct_the_baseline() {
        let svc = service();
        let p = svc.create_product(details("A1", 10)).await.unwrap();

        let updated = svc
            .update_product(p.id_typed(), details("A1", 4))
            .await
            .unwrap();
        assert_eq!(updated.current_stock(), 4);
        assert_eq!(updated.created_at(), p.created_at());
    }

    #[tokio::test]
    async fn recent_history_respects_limit() {
        let svc = service();
        let p = svc.create_product(details("A1", 0)).await.unwrap();
        for _ in 0..5 {
            svc.adjust_stock(p.id_typed(), StockDirection::In, 1, None)
                .await
                .unwrap();
        }

        assert_eq!(svc.recent_history(Some(3)).await.unwrap().len(), 3);
        assert_eq!(svc.recent_history(None).await.unwrap().len(), 5);
        assert_eq!(svc.recent_history(Some(0)).await.unwrap().len(), 1);
    }
}
