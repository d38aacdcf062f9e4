use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ProductId, TransactionId};

/// Largest quantity a single movement may carry.
pub const MAX_QUANTITY: i64 = 100_000;

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockDirection {
    In,
    Out,
}

impl StockDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            StockDirection::In => "in",
            StockDirection::Out => "out",
        }
    }

    /// Signed stock delta for `quantity` units moving in this direction.
    pub fn signed(self, quantity: Quantity) -> i64 {
        match self {
            StockDirection::In => quantity.get(),
            StockDirection::Out => -quantity.get(),
        }
    }
}

impl core::fmt::Display for StockDirection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(StockDirection::In),
            "out" => Ok(StockDirection::Out),
            other => Err(DomainError::validation(format!(
                "direction must be 'in' or 'out' (got '{other}')"
            ))),
        }
    }
}

/// Units moved by one ledger entry: `1..=MAX_QUANTITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Quantity(i64);

impl Quantity {
    pub fn new(value: i64) -> DomainResult<Self> {
        if value <= 0 {
            return Err(DomainError::validation("quantity must be a positive integer"));
        }
        if value > MAX_QUANTITY {
            return Err(DomainError::validation(format!(
                "quantity must be at most {MAX_QUANTITY}"
            )));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Quantity {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Quantity::new(raw).map_err(serde::de::Error::custom)
    }
}

/// A validated request to move stock for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub direction: StockDirection,
    pub quantity: Quantity,
    pub notes: String,
}

/// Result of a committed adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdjustmentReceipt {
    pub transaction_id: TransactionId,
    pub new_stock: i64,
}

/// One immutable stock movement.
///
/// Entries have no mutators: they are created once, as part of an adjustment,
/// and never edited or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    id: TransactionId,
    product_id: ProductId,
    #[serde(rename = "type")]
    direction: StockDirection,
    quantity: Quantity,
    notes: String,
    created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn record(
        id: TransactionId,
        adjustment: &StockAdjustment,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_id: adjustment.product_id,
            direction: adjustment.direction,
            quantity: adjustment.quantity,
            notes: adjustment.notes.clone(),
            created_at,
        }
    }

    /// Rebuild an entry from persisted columns.
    pub fn restore(
        id: TransactionId,
        product_id: ProductId,
        direction: StockDirection,
        quantity: Quantity,
        notes: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_id,
            direction,
            quantity,
            notes,
            created_at,
        }
    }

    pub fn id_typed(&self) -> TransactionId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn direction(&self) -> StockDirection {
        self.direction
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn signed_quantity(&self) -> i64 {
        self.direction.signed(self.quantity)
    }
}

/// Decide the stock level after moving `quantity` units in `direction`.
///
/// Must be evaluated against a stock value read inside the same atomic scope
/// that will write the result.
pub fn plan_adjustment(
    current_stock: i64,
    direction: StockDirection,
    quantity: Quantity,
) -> DomainResult<i64> {
    match direction {
        StockDirection::In => current_stock
            .checked_add(quantity.get())
            .ok_or_else(|| DomainError::validation("stock level would overflow")),
        StockDirection::Out => {
            if current_stock < quantity.get() {
                return Err(DomainError::insufficient_stock(current_stock, quantity.get()));
            }
            Ok(current_stock - quantity.get())
        }
    }
}

/// Net stock movement recorded by a set of entries (Σin − Σout).
pub fn ledger_balance<'a, I>(entries: I) -> i64
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    entries.into_iter().map(LedgerEntry::signed_quantity).sum()
}
