//! SQLite-backed catalog, ledger and user table.
//!
//! ## Error Mapping
//!
//! | SQLx error | StoreError | Scenario |
//! |------------|------------|----------|
//! | Database (unique violation) | `Domain(Conflict)` | SKU or username already taken |
//! | Database (foreign key violation) | `Domain(Conflict)` | Product still referenced by ledger rows |
//! | Database (other) | `Backend` | Constraint/trigger failures, disk errors |
//! | PoolClosed / other | `Backend` | Connection failures |
//!
//! ## Adjustments
//!
//! `apply_adjustment` runs in one transaction. The first statement is a
//! no-op write on the product row, which takes SQLite's write lock before the
//! stock is read; the final UPDATE is additionally guarded on the value that
//! was read (compare-and-set), so a lost race surfaces as `Conflict` and never
//! as a second debit of the same units.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::instrument;

use async_trait::async_trait;

use stockledger_auth::{PasswordHash, UserAccount};
use stockledger_core::{DomainError, ProductId, TransactionId, UserId};
use stockledger_inventory::{
    AdjustmentReceipt, LedgerEntry, Quantity, StockAdjustment, StockDirection, plan_adjustment,
};
use stockledger_products::{Product, ProductDetails};

use super::{HistoryEntry, InventoryStore, StoreError, UserStore};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id            TEXT PRIMARY KEY,
        sku           TEXT NOT NULL UNIQUE,
        name          TEXT NOT NULL,
        description   TEXT NOT NULL DEFAULT '',
        category      TEXT NOT NULL DEFAULT '',
        current_stock INTEGER NOT NULL DEFAULT 0 CHECK (current_stock >= 0),
        min_stock     INTEGER NOT NULL DEFAULT 5 CHECK (min_stock >= 0),
        created_at    TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id         TEXT PRIMARY KEY,
        product_id TEXT NOT NULL REFERENCES products (id),
        type       TEXT NOT NULL CHECK (type IN ('in', 'out')),
        quantity   INTEGER NOT NULL CHECK (quantity > 0),
        notes      TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS transactions_product_created
        ON transactions (product_id, created_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            TEXT PRIMARY KEY,
        username      TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL
    )
    "#,
];

const PRODUCT_COLUMNS: &str =
    "id, sku, name, description, category, current_stock, min_stock, created_at";

/// SQLite-backed store for products, stock transactions and users.
#[derive(Debug, Clone)]
pub struct SqliteInventoryStore {
    pool: SqlitePool,
}

impl SqliteInventoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `url`.
    ///
    /// In-memory URLs get a single long-lived connection: every SQLite
    /// connection to `:memory:` is its own database.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| map_sqlx_error("connect", e))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool_options = if url.contains(":memory:") || url.contains("mode=memory") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for SqliteInventoryStore {
    #[instrument(skip(self, product), fields(sku = %product.sku()), err)]
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, description, category, current_stock, min_stock, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(product.id_typed().to_string())
        .bind(product.sku())
        .bind(product.name())
        .bind(product.description())
        .bind(product.category())
        .bind(product.current_stock())
        .bind(product.min_stock())
        .bind(encode_time(product.created_at()))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::conflict(format!("SKU '{}' already exists", product.sku())).into()
            } else {
                map_sqlx_error("insert_product", e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self, details), fields(product_id = %id), err)]
    async fn update_product(
        &self,
        id: ProductId,
        details: &ProductDetails,
    ) -> Result<Product, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let result = sqlx::query(
            r#"
            UPDATE products
            SET sku = ?, name = ?, description = ?, category = ?, current_stock = ?, min_stock = ?
            WHERE id = ?
            "#,
        )
        .bind(&details.sku)
        .bind(&details.name)
        .bind(&details.description)
        .bind(&details.category)
        .bind(details.current_stock)
        .bind(details.min_stock)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::conflict(format!("SKU '{}' already exists", details.sku)).into()
            } else {
                map_sqlx_error("update_product", e)
            }
        })?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(DomainError::not_found("product").into());
        }

        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))
            .bind(id.to_string())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_product", e))?;
        let product = product_from_row(&row)?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        if exists.is_none() {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(DomainError::not_found("product").into());
        }

        let history: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE product_id = ?")
                .bind(id.to_string())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("delete_product", e))?;
        if history > 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(DomainError::conflict("product has transaction history").into());
        }

        sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;
        rows.iter().map(product_from_row).collect()
    }

    async fn low_stock_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE current_stock <= min_stock
            ORDER BY (current_stock - min_stock) ASC, sku ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("low_stock_products", e))?;
        rows.iter().map(product_from_row).collect()
    }

    #[instrument(
        skip(self, adjustment),
        fields(
            product_id = %adjustment.product_id,
            direction = %adjustment.direction,
            quantity = adjustment.quantity.get()
        ),
        err
    )]
    async fn apply_adjustment(
        &self,
        adjustment: &StockAdjustment,
    ) -> Result<AdjustmentReceipt, StoreError> {
        let product_id = adjustment.product_id.to_string();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Take the write lock before reading.
        sqlx::query("UPDATE products SET current_stock = current_stock WHERE id = ?")
            .bind(&product_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_product", e))?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT current_stock FROM products WHERE id = ?")
                .bind(&product_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("read_stock", e))?;
        let Some(current) = current else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(DomainError::not_found("product").into());
        };

        let new_stock = match plan_adjustment(current, adjustment.direction, adjustment.quantity) {
            Ok(n) => n,
            Err(e) => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(e.into());
            }
        };

        let entry = LedgerEntry::record(TransactionId::new(), adjustment, Utc::now());
        sqlx::query(
            r#"
            INSERT INTO transactions (id, product_id, type, quantity, notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id_typed().to_string())
        .bind(&product_id)
        .bind(entry.direction().as_str())
        .bind(entry.quantity().get())
        .bind(entry.notes())
        .bind(encode_time(entry.created_at()))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transaction", e))?;

        let updated = sqlx::query(
            "UPDATE products SET current_stock = ? WHERE id = ? AND current_stock = ?",
        )
        .bind(new_stock)
        .bind(&product_id)
        .bind(current)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_stock", e))?;

        if updated.rows_affected() != 1 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(DomainError::conflict("stock level changed concurrently; retry").into());
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(AdjustmentReceipt {
            transaction_id: entry.id_typed(),
            new_stock,
        })
    }

    async fn product_history(&self, id: ProductId) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, type, quantity, notes, created_at
            FROM transactions
            WHERE product_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("product_history", e))?;
        rows.iter().map(entry_from_row).collect()
    }

    async fn recent_history(&self, limit: u32) -> Result<Vec<HistoryEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.product_id, t.type, t.quantity, t.notes, t.created_at,
                   p.sku, p.name AS product_name
            FROM transactions t
            JOIN products p ON p.id = t.product_id
            ORDER BY t.created_at DESC, t.id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("recent_history", e))?;

        rows.iter()
            .map(|row| {
                Ok(HistoryEntry {
                    entry: entry_from_row(row)?,
                    sku: column(row, "sku")?,
                    product_name: column(row, "product_name")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl UserStore for SqliteInventoryStore {
    async fn find_user(&self, username: &str) -> Result<Option<UserAccount>, StoreError> {
        let row = sqlx::query("SELECT id, username, password_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id: String = column(&row, "id")?;
        let hash: String = column(&row, "password_hash")?;
        Ok(Some(UserAccount {
            id: parse_column::<UserId>("id", &id)?,
            username: column(&row, "username")?,
            password_hash: PasswordHash::parse(&hash)
                .map_err(|e| StoreError::backend("find_user", e.to_string()))?,
        }))
    }

    async fn insert_user_if_absent(&self, user: &UserAccount) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash)
            VALUES (?, ?, ?)
            ON CONFLICT (username) DO NOTHING
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(user.password_hash.encode())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(result.rows_affected() == 1)
    }
}

fn encode_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::backend("decode_row", format!("bad timestamp '{raw}': {e}")))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::backend("decode_row", format!("column '{name}': {e}")))
}

fn parse_column<T>(name: &str, raw: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| StoreError::backend("decode_row", format!("column '{name}': {e}")))
}

fn product_from_row(row: &SqliteRow) -> Result<Product, StoreError> {
    let id: String = column(row, "id")?;
    let created_at: String = column(row, "created_at")?;
    Ok(Product::restore(
        parse_column("id", &id)?,
        ProductDetails {
            sku: column(row, "sku")?,
            name: column(row, "name")?,
            description: column(row, "description")?,
            category: column(row, "category")?,
            current_stock: column(row, "current_stock")?,
            min_stock: column(row, "min_stock")?,
        },
        decode_time(&created_at)?,
    ))
}

fn entry_from_row(row: &SqliteRow) -> Result<LedgerEntry, StoreError> {
    let id: String = column(row, "id")?;
    let product_id: String = column(row, "product_id")?;
    let direction: String = column(row, "type")?;
    let quantity: i64 = column(row, "quantity")?;
    let created_at: String = column(row, "created_at")?;

    Ok(LedgerEntry::restore(
        parse_column::<TransactionId>("id", &id)?,
        parse_column::<ProductId>("product_id", &product_id)?,
        parse_column::<StockDirection>("type", &direction)?,
        Quantity::new(quantity)
            .map_err(|e| StoreError::backend("decode_row", format!("column 'quantity': {e}")))?,
        column(row, "notes")?,
        decode_time(&created_at)?,
    ))
}

/// Map SQLx errors to store errors.
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.is_unique_violation() {
                DomainError::conflict(db_err.message().to_string()).into()
            } else if db_err.is_foreign_key_violation() {
                DomainError::conflict(format!(
                    "referenced row still in use: {}",
                    db_err.message()
                ))
                .into()
            } else {
                StoreError::backend(operation, format!("database error: {}", db_err.message()))
            }
        }
        sqlx::Error::PoolClosed => StoreError::backend(operation, "connection pool closed"),
        other => StoreError::backend(operation, other.to_string()),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
