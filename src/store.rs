// store.rs
use anyhow::Result;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::{Customer, LineItem, OrderRecord};

/// Outcome of applying one sold line item to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockOutcome {
    /// Numeric stock was decremented, clamped at zero.
    Decremented { remaining: i64 },
    /// Untracked one-of-a-kind piece; the product row was deleted.
    Removed,
    /// Product row no longer exists, nothing to do.
    Skipped,
}

/// Current stock position of a single product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductStock {
    Tracked(i64),
    /// No numeric stock column value: a unique piece with implicit stock 1.
    Untracked,
    Missing,
}

/// Stock never goes negative: overselling a tracked item clamps at zero.
/// A non-positive qty is treated as zero so a malformed quantity can never
/// inflate stock.
pub fn clamped_decrement(stock: i64, qty: i64) -> i64 {
    (stock - qty.max(0)).max(0)
}

#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Database { pool })
    }

    /// Builds a pool without touching the network. Used by tests that only
    /// exercise request paths which never reach the database.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect_lazy(database_url)?;
        Ok(Database { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS furniture (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                stock INTEGER CHECK (stock >= 0),
                created_at TIMESTAMPTZ DEFAULT NOW(),
                updated_at TIMESTAMPTZ DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                amount BIGINT NOT NULL,
                currency TEXT NOT NULL,
                status TEXT NOT NULL,
                created TIMESTAMPTZ NOT NULL,
                items_summary TEXT NOT NULL DEFAULT '',
                items JSONB NOT NULL DEFAULT '[]',
                customer JSONB,
                updated_at TIMESTAMPTZ DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Merge-upserts an order keyed by the provider's payment id. Redelivery
    /// of the same event overwrites fields but never creates a second row;
    /// this is the idempotency boundary for order bookkeeping.
    pub async fn upsert_order(&self, order: &OrderRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, amount, currency, status, created, items_summary, items, customer)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                status = EXCLUDED.status,
                created = EXCLUDED.created,
                items_summary = EXCLUDED.items_summary,
                items = EXCLUDED.items,
                customer = EXCLUDED.customer,
                updated_at = NOW()
            "#,
        )
        .bind(&order.id)
        .bind(order.amount)
        .bind(&order.currency)
        .bind(&order.status)
        .bind(order.created)
        .bind(&order.items_summary)
        .bind(Json(&order.items))
        .bind(order.customer.as_ref().map(Json))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_order(&self, id: &str) -> Result<Option<OrderRecord>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, amount, currency, status, created, items_summary, items, customer
            FROM orders WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let Json(items): Json<Vec<LineItem>> = row.get("items");
            let customer: Option<Json<Customer>> = row.get("customer");
            OrderRecord {
                id: row.get("id"),
                amount: row.get("amount"),
                currency: row.get("currency"),
                status: row.get("status"),
                created: row.get("created"),
                items_summary: row.get("items_summary"),
                items,
                customer: customer.map(|Json(c)| c),
            }
        }))
    }

    /// Applies one sold line item inside its own transaction. The row lock
    /// serializes concurrent decrements of the same product across
    /// overlapping webhook deliveries.
    pub async fn apply_line_item(&self, item: &LineItem) -> Result<StockOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT stock FROM furniture WHERE id = $1 FOR UPDATE")
            .bind(&item.product_id)
            .fetch_optional(&mut *tx)
            .await?;

        let outcome = match row {
            None => StockOutcome::Skipped,
            Some(row) => {
                let stock: Option<i32> = row.get("stock");
                match stock {
                    Some(stock) => {
                        let remaining = clamped_decrement(i64::from(stock), item.qty);
                        sqlx::query("UPDATE furniture SET stock = $2, updated_at = NOW() WHERE id = $1")
                            .bind(&item.product_id)
                            .bind(remaining as i32)
                            .execute(&mut *tx)
                            .await?;
                        StockOutcome::Decremented { remaining }
                    }
                    None => {
                        sqlx::query("DELETE FROM furniture WHERE id = $1")
                            .bind(&item.product_id)
                            .execute(&mut *tx)
                            .await?;
                        StockOutcome::Removed
                    }
                }
            }
        };

        tx.commit().await?;
        info!(product_id = %item.product_id, ?outcome, "applied line item");
        Ok(outcome)
    }

    /// Catalog seeding. `stock` of `None` marks an untracked one-of-a-kind
    /// piece.
    pub async fn upsert_product(
        &self,
        id: &str,
        name: &str,
        stock: Option<i32>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO furniture (id, name, stock)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                stock = EXCLUDED.stock,
                updated_at = NOW()
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(stock)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Read-only stock lookup for the pre-payment availability check.
    pub async fn product_stock(&self, product_id: &str) -> Result<ProductStock, sqlx::Error> {
        let row = sqlx::query("SELECT stock FROM furniture WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            None => ProductStock::Missing,
            Some(row) => {
                let stock: Option<i32> = row.get("stock");
                match stock {
                    Some(stock) => ProductStock::Tracked(i64::from(stock)),
                    None => ProductStock::Untracked,
                }
            }
        })
    }
}
