//! Integration tests for the stock pipeline.
//!
//! Tests: StockService → InventoryStore (in-memory and SQLite)
//!
//! Verifies:
//! - Every accepted adjustment appends exactly one ledger entry
//! - Rejected adjustments leave stock and ledger untouched
//! - Concurrent outs never oversell

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stockledger_core::{DomainError, ProductId};
    use stockledger_inventory::{StockDirection, ledger_balance};
    use stockledger_products::ProductDetails;

    use crate::service::{ServiceError, StockService};
    use crate::store::{InMemoryInventoryStore, InventoryStore, SqliteInventoryStore};

    fn details(sku: &str, stock: i64, min_stock: i64) -> ProductDetails {
        ProductDetails {
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            description: String::new(),
            category: String::new(),
            current_stock: stock,
            min_stock,
        }
    }

    async fn sqlite() -> SqliteInventoryStore {
        let store = SqliteInventoryStore::connect("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    async fn ledger_round_trip<S: InventoryStore>(svc: StockService<S>) {
        let p = svc.create_product(details("A1", 10, 5)).await.unwrap();
        let id = p.id_typed();

        let receipt = svc
            .adjust_stock(id, StockDirection::Out, 3, Some("order #1".to_string()))
            .await
            .unwrap();
        assert_eq!(receipt.new_stock, 7);

        let err = svc
            .adjust_stock(id, StockDirection::Out, 8, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(DomainError::InsufficientStock { available: 7, requested: 8 })
        ));

        let receipt = svc.adjust_stock(id, StockDirection::In, 5, None).await.unwrap();
        assert_eq!(receipt.new_stock, 12);

        let history = svc.product_history(id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id_typed(), receipt.transaction_id);
        assert_eq!(history[0].direction(), StockDirection::In);
        assert_eq!(history[1].notes(), "order #1");

        let current = svc.get_product(id).await.unwrap().current_stock();
        assert_eq!(current, 10 + ledger_balance(&history));

        let recent = svc.recent_history(None).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].sku, "A1");
        assert_eq!(recent[0].product_name, "Product A1");
    }

    async fn catalog_rules<S: InventoryStore>(svc: StockService<S>) {
        let a = svc.create_product(details("A1", 10, 5)).await.unwrap();

        let err = svc.create_product(details("A1", 0, 0)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));

        let err = svc.create_product(details("  ", 0, 0)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));

        let b = svc.create_product(details("B1", 0, 0)).await.unwrap();
        svc.delete_product(b.id_typed()).await.unwrap();
        let err = svc.get_product(b.id_typed()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));

        svc.adjust_stock(a.id_typed(), StockDirection::In, 1, None)
            .await
            .unwrap();
        let err = svc.delete_product(a.id_typed()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));

        let err = svc.delete_product(ProductId::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
    }

    async fn low_stock_ordering<S: InventoryStore>(svc: StockService<S>) {
        svc.create_product(details("OK", 50, 5)).await.unwrap();
        svc.create_product(details("EDGE", 5, 5)).await.unwrap();
        svc.create_product(details("EMPTY", 0, 10)).await.unwrap();
        svc.create_product(details("LOW", 2, 5)).await.unwrap();

        let alerts = svc.low_stock_alerts().await.unwrap();
        let skus: Vec<&str> = alerts.iter().map(|p| p.sku()).collect();
        assert_eq!(skus, vec!["EMPTY", "LOW", "EDGE"]);

        let listed = svc.list_products().await.unwrap();
        assert_eq!(listed.len(), 4);
        assert_eq!(listed[0].sku(), "LOW");
    }

    /// 40 outs of 3 race for 30 units: exactly 10 commit, the rest see
    /// insufficient stock. Nothing may surface as a conflict or store error.
    async fn concurrent_outs_never_oversell<S>(svc: Arc<StockService<S>>)
    where
        S: InventoryStore + 'static,
    {
        let p = svc.create_product(details("HOT", 30, 5)).await.unwrap();
        let id = p.id_typed();

        let mut handles = Vec::new();
        for _ in 0..40 {
            let svc = Arc::clone(&svc);
            handles.push(tokio::spawn(async move {
                svc.adjust_stock(id, StockDirection::Out, 3, None).await
            }));
        }

        let mut committed = 0i64;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(ServiceError::Domain(DomainError::InsufficientStock { .. })) => {}
                Err(other) => panic!("unexpected failure: {other:?}"),
            }
        }
        assert_eq!(committed, 10);

        let history = svc.product_history(id).await.unwrap();
        assert_eq!(history.len(), 10);
        let current = svc.get_product(id).await.unwrap().current_stock();
        assert_eq!(current, 0);
        assert_eq!(current, 30 + ledger_balance(&history));
    }

    #[tokio::test]
    async fn in_memory_ledger_round_trip() {
        ledger_round_trip(StockService::new(InMemoryInventoryStore::new())).await;
    }

    #[tokio::test]
    async fn sqlite_ledger_round_trip() {
        ledger_round_trip(StockService::new(sqlite().await)).await;
    }

    #[tokio::test]
    async fn in_memory_catalog_rules() {
        catalog_rules(StockService::new(InMemoryInventoryStore::new())).await;
    }

    #[tokio::test]
    async fn sqlite_catalog_rules() {
        catalog_rules(StockService::new(sqlite().await)).await;
    }

    #[tokio::test]
    async fn in_memory_low_stock_ordering() {
        low_stock_ordering(StockService::new(InMemoryInventoryStore::new())).await;
    }

    #[tokio::test]
    async fn sqlite_low_stock_ordering() {
        low_stock_ordering(StockService::new(sqlite().await)).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn in_memory_concurrent_outs() {
        let svc = Arc::new(StockService::new(InMemoryInventoryStore::new()));
        concurrent_outs_never_oversell(svc).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn sqlite_file_concurrent_outs() {
        // A file database so the pool really holds several connections.
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("stock.db").display());
        let store = SqliteInventoryStore::connect(&url).await.unwrap();
        store.migrate().await.unwrap();
        assert!(store.pool().options().get_max_connections() > 1);

        concurrent_outs_never_oversell(Arc::new(StockService::new(store))).await;
    }
}
