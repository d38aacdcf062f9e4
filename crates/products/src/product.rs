use core::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ProductId};

/// Low-stock threshold applied when a product is created without one.
pub const DEFAULT_MIN_STOCK: i64 = 5;

/// Editable product fields, as supplied by a create or update request.
///
/// `current_stock` is part of the details because the catalog lets operators
/// set a baseline directly; movements after that go through the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub sku: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub current_stock: i64,
    pub min_stock: i64,
}

impl ProductDetails {
    /// Validate and normalize the details.
    ///
    /// SKU and name are trimmed; description and category are kept verbatim.
    pub fn validated(self) -> DomainResult<Self> {
        let sku = self.sku.trim();
        let name = self.name.trim();

        if sku.is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.current_stock < 0 {
            return Err(DomainError::validation("current_stock cannot be negative"));
        }
        if self.min_stock < 0 {
            return Err(DomainError::validation("min_stock cannot be negative"));
        }

        Ok(Self {
            sku: sku.to_string(),
            name: name.to_string(),
            ..self
        })
    }
}

/// Catalog entry: a stock-keeping unit and its current stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    sku: String,
    name: String,
    description: String,
    category: String,
    current_stock: i64,
    min_stock: i64,
    created_at: DateTime<Utc>,
}

impl Product {
    /// Build a new product from validated details.
    pub fn create(
        id: ProductId,
        details: ProductDetails,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let details = details.validated()?;
        Ok(Self {
            id,
            sku: details.sku,
            name: details.name,
            description: details.description,
            category: details.category,
            current_stock: details.current_stock,
            min_stock: details.min_stock,
            created_at,
        })
    }

    /// Rebuild a product from persisted columns.
    pub fn restore(id: ProductId, details: ProductDetails, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            sku: details.sku,
            name: details.name,
            description: details.description,
            category: details.category,
            current_stock: details.current_stock,
            min_stock: details.min_stock,
            created_at,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn current_stock(&self) -> i64 {
        self.current_stock
    }

    pub fn min_stock(&self) -> i64 {
        self.min_stock
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current fields in their editable form.
    pub fn details(&self) -> ProductDetails {
        ProductDetails {
            sku: self.sku.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            current_stock: self.current_stock,
            min_stock: self.min_stock,
        }
    }

    /// Replace every editable field (identity and creation time are kept).
    pub fn apply_details(&mut self, details: ProductDetails) -> DomainResult<()> {
        let details = details.validated()?;
        self.sku = details.sku;
        self.name = details.name;
        self.description = details.description;
        self.category = details.category;
        self.current_stock = details.current_stock;
        self.min_stock = details.min_stock;
        Ok(())
    }

    /// Set the stock counter after a ledger movement.
    pub fn set_current_stock(&mut self, value: i64) -> DomainResult<()> {
        if value < 0 {
            return Err(DomainError::validation("current_stock cannot be negative"));
        }
        self.current_stock = value;
        Ok(())
    }

    /// At or below the configured minimum.
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.min_stock
    }

    /// `current_stock - min_stock`; the more negative, the more critical.
    pub fn stock_margin(&self) -> i64 {
        self.current_stock - self.min_stock
    }
}

/// Most critical shortage first; SKU breaks ties so the order is stable.
pub fn by_criticality(a: &Product, b: &Product) -> Ordering {
    a.stock_margin()
        .cmp(&b.stock_margin())
        .then_with(|| a.sku.cmp(&b.sku))
}

/// Low-stock view over a set of products.
pub fn low_stock_report<I>(products: I) -> Vec<Product>
where
    I: IntoIterator<Item = Product>,
{
    let mut low: Vec<Product> = products.into_iter().filter(Product::is_low_stock).collect();
    low.sort_by(by_criticality);
    low
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(sku: &str, current_stock: i64, min_stock: i64) -> ProductDetails {
        ProductDetails {
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            description: String::new(),
            category: String::new(),
            current_stock,
            min_stock,
        }
    }

    fn product(sku: &str, current_stock: i64, min_stock: i64) -> Product {
        Product::create(ProductId::new(), details(sku, current_stock, min_stock), Utc::now())
            .unwrap()
    }

    #[test]
    fn create_trims_sku_and_name() {
        let mut d = details("  A1 ", 10, 5);
        d.name = "  Widget  ".to_string();
        let p = Product::create(ProductId::new(), d, Utc::now()).unwrap();
        assert_eq!(p.sku(), "A1");
        assert_eq!(p.name(), "Widget");
    }

    #[test]
    fn create_rejects_blank_sku() {
        let err = Product::create(ProductId::new(), details("   ", 0, 0), Utc::now()).unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("SKU")),
            other => panic!("expected Validation error for blank sku, got {other:?}"),
        }
    }

    #[test]
    fn create_rejects_blank_name() {
        let mut d = details("A1", 0, 0);
        d.name = "\t".to_string();
        let err = Product::create(ProductId::new(), d, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_rejects_negative_levels() {
        let err = Product::create(ProductId::new(), details("A1", -1, 0), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = Product::create(ProductId::new(), details("A1", 0, -1), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn apply_details_keeps_identity_and_creation_time() {
        let mut p = product("A1", 10, 5);
        let id = p.id_typed();
        let created_at = p.created_at();

        p.apply_details(details("B2", 3, 1)).unwrap();

        assert_eq!(p.id_typed(), id);
        assert_eq!(p.created_at(), created_at);
        assert_eq!(p.sku(), "B2");
        assert_eq!(p.current_stock(), 3);
    }

    #[test]
    fn apply_details_rejects_invalid_fields_without_mutating() {
        let mut p = product("A1", 10, 5);
        let before = p.clone();
        assert!(p.apply_details(details("", 1, 1)).is_err());
        assert_eq!(p, before);
    }

    #[test]
    fn set_current_stock_refuses_negative() {
        let mut p = product("A1", 10, 5);
        assert!(p.set_current_stock(-1).is_err());
        assert_eq!(p.current_stock(), 10);
        p.set_current_stock(0).unwrap();
        assert_eq!(p.current_stock(), 0);
    }

    #[test]
    fn low_stock_includes_equal_to_threshold() {
        assert!(product("A1", 5, 5).is_low_stock());
        assert!(product("A2", 4, 5).is_low_stock());
        assert!(!product("A3", 6, 5).is_low_stock());
    }

    #[test]
    fn low_stock_report_orders_most_critical_first() {
        let report = low_stock_report(vec![
            product("OK", 50, 5),
            product("MILD", 5, 5),
            product("BAD", 0, 10),
            product("MID", 2, 5),
        ]);

        let skus: Vec<&str> = report.iter().map(Product::sku).collect();
        assert_eq!(skus, vec!["BAD", "MID", "MILD"]);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: every product in the report is low, and the report is sorted by margin.
            #[test]
            fn low_stock_report_is_filtered_and_sorted(
                levels in prop::collection::vec((0i64..100, 0i64..100), 0..30)
            ) {
                let products: Vec<Product> = levels
                    .iter()
                    .enumerate()
                    .map(|(i, (cur, min))| product(&format!("SKU-{i}"), *cur, *min))
                    .collect();
                let expected_len = products.iter().filter(|p| p.is_low_stock()).count();

                let report = low_stock_report(products);

                prop_assert_eq!(report.len(), expected_len);
                prop_assert!(report.iter().all(Product::is_low_stock));
                prop_assert!(report.windows(2).all(|w| w[0].stock_margin() <= w[1].stock_margin()));
            }

            /// Property: non-negative levels with a non-blank sku and name always validate.
            #[test]
            fn valid_details_are_accepted(
                sku in "[A-Z0-9]{1,20}",
                name in "[A-Za-z][A-Za-z0-9 ]{0,60}",
                current_stock in 0i64..1_000_000,
                min_stock in 0i64..1_000_000,
            ) {
                let d = ProductDetails {
                    sku: sku.clone(),
                    name,
                    description: String::new(),
                    category: String::new(),
                    current_stock,
                    min_stock,
                };
                let v = d.validated().unwrap();
                prop_assert_eq!(v.sku, sku);
                prop_assert_eq!(v.current_stock, current_stock);
            }

            /// Property: a negative level is always rejected.
            #[test]
            fn negative_levels_are_rejected(level in i64::MIN..0) {
                prop_assert!(details("A1", level, 0).validated().is_err());
                prop_assert!(details("A1", 0, level).validated().is_err());
            }
        }
    }
}
