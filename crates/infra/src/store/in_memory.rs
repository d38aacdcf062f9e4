use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use stockledger_auth::UserAccount;
use stockledger_core::{DomainError, ProductId, TransactionId};
use stockledger_inventory::{AdjustmentReceipt, LedgerEntry, StockAdjustment, plan_adjustment};
use stockledger_products::{Product, ProductDetails, low_stock_report};

use super::{HistoryEntry, InventoryStore, StoreError, UserStore};

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    /// Append-only, in commit order.
    ledger: Vec<LedgerEntry>,
    users: HashMap<String, UserAccount>,
}

impl State {
    fn sku_taken(&self, sku: &str, except: Option<ProductId>) -> bool {
        self.products
            .values()
            .any(|p| p.sku() == sku && Some(p.id_typed()) != except)
    }
}

/// In-memory catalog, ledger and user table.
///
/// Intended for tests/dev. Every adjustment holds the write lock from the
/// stock read to the ledger append, so concurrent adjustments serialize.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    state: RwLock<State>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned(operation: &'static str) -> StoreError {
        StoreError::backend(operation, "lock poisoned")
    }
}

fn newest_first_products(products: &mut [Product]) {
    products.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id_typed().cmp(&a.id_typed()))
    });
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| Self::poisoned("insert_product"))?;

        if state.sku_taken(product.sku(), None) {
            return Err(DomainError::conflict(format!("SKU '{}' already exists", product.sku())).into());
        }
        state.products.insert(product.id_typed(), product.clone());
        Ok(())
    }

    async fn update_product(
        &self,
        id: ProductId,
        details: &ProductDetails,
    ) -> Result<Product, StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| Self::poisoned("update_product"))?;

        if !state.products.contains_key(&id) {
            return Err(DomainError::not_found("product").into());
        }
        if state.sku_taken(&details.sku, Some(id)) {
            return Err(DomainError::conflict(format!("SKU '{}' already exists", details.sku)).into());
        }

        let product = state
            .products
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("product"))?;
        product.apply_details(details.clone())?;
        Ok(product.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| Self::poisoned("delete_product"))?;

        if !state.products.contains_key(&id) {
            return Err(DomainError::not_found("product").into());
        }
        if state.ledger.iter().any(|e| e.product_id() == id) {
            return Err(DomainError::conflict("product has transaction history").into());
        }
        state.products.remove(&id);
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| Self::poisoned("get_product"))?;
        Ok(state.products.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| Self::poisoned("list_products"))?;
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        newest_first_products(&mut products);
        Ok(products)
    }

    async fn low_stock_products(&self) -> Result<Vec<Product>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| Self::poisoned("low_stock_products"))?;
        Ok(low_stock_report(state.products.values().cloned()))
    }

    async fn apply_adjustment(
        &self,
        adjustment: &StockAdjustment,
    ) -> Result<AdjustmentReceipt, StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| Self::poisoned("apply_adjustment"))?;

        let current = state
            .products
            .get(&adjustment.product_id)
            .map(Product::current_stock)
            .ok_or_else(|| DomainError::not_found("product"))?;

        let new_stock = plan_adjustment(current, adjustment.direction, adjustment.quantity)?;

        // Nothing below can fail a business rule; mutate both halves together.
        let entry = LedgerEntry::record(TransactionId::new(), adjustment, Utc::now());
        let product = state
            .products
            .get_mut(&adjustment.product_id)
            .ok_or_else(|| DomainError::not_found("product"))?;
        product.set_current_stock(new_stock)?;

        let receipt = AdjustmentReceipt {
            transaction_id: entry.id_typed(),
            new_stock,
        };
        state.ledger.push(entry);
        Ok(receipt)
    }

    async fn product_history(&self, id: ProductId) -> Result<Vec<LedgerEntry>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| Self::poisoned("product_history"))?;
        Ok(state
            .ledger
            .iter()
            .rev()
            .filter(|e| e.product_id() == id)
            .cloned()
            .collect())
    }

    async fn recent_history(&self, limit: u32) -> Result<Vec<HistoryEntry>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| Self::poisoned("recent_history"))?;

        let entries = state
            .ledger
            .iter()
            .rev()
            .filter_map(|e| {
                let product = state.products.get(&e.product_id())?;
                Some(HistoryEntry {
                    entry: e.clone(),
                    sku: product.sku().to_string(),
                    product_name: product.name().to_string(),
                })
            })
            .take(limit as usize)
            .collect();
        Ok(entries)
    }
}

#[async_trait]
impl UserStore for InMemoryInventoryStore {
    async fn find_user(&self, username: &str) -> Result<Option<UserAccount>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| Self::poisoned("find_user"))?;
        Ok(state.users.get(username).cloned())
    }

    async fn insert_user_if_absent(&self, user: &UserAccount) -> Result<bool, StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| Self::poisoned("insert_user_if_absent"))?;
        if state.users.contains_key(&user.username) {
            return Ok(false);
        }
        state.users.insert(user.username.clone(), user.clone());
        Ok(true)
    }
}
