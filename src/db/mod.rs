//! This module is responsible for reading, writing and managing the SQLite database that holds the
//! imported transactions.

mod migrations;

use crate::error::Re;
use crate::model::{Transaction, TransactionField};
use anyhow::{bail, Context};
use async_trait::async_trait;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::fmt::Debug;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// The store that the import pipeline writes to.
///
/// `Db` is the production implementation. The trait exists so the pipeline can be driven against
/// a store that fails on purpose.
#[async_trait]
pub trait Store: Debug + Send + Sync {
    /// Deletes every transaction. Returns the number of rows removed.
    async fn clear_transactions(&self) -> anyhow::Result<u64>;

    /// Inserts all `transactions` in one commit. Either all rows land or none do.
    async fn insert_transactions(&self, transactions: &[Transaction]) -> anyhow::Result<u64>;
}

#[derive(Debug, Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// - Validates that no file currently exists at `path`
    /// - Creates a new SQLite file at `path`
    /// - Initializes the database schema
    pub(crate) async fn init(path: impl AsRef<Path>) -> Re<Self> {
        let path = path.as_ref();
        if path.exists() {
            bail!("A database already exists at '{}'", path.display());
        }
        Self::connect(path).await
    }

    /// - Validates that there is a SQLite file at `path`
    /// - Updates the database schema with migrations if it is out-of-date
    pub(crate) async fn load(path: impl AsRef<Path>) -> Re<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("The database file is missing '{}'", path.display());
        }
        Self::connect(path).await
    }

    async fn connect(path: &Path) -> Re<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .context("Failed to parse SQLite connection string")?
            .create_if_missing(true);

        // One connection: every statement against the store is serialized.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open SQLite database at {}", path.display()))?;

        let version = migrations::bootstrap(&pool).await?;
        migrations::run(&pool, version, migrations::CURRENT_VERSION).await?;
        debug!("Opened database at {}", path.display());
        Ok(Self { pool })
    }

    /// Returns the number of rows in the transactions table.
    pub(crate) async fn count_transactions(&self) -> Re<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count transactions")?;
        Ok(row.0 as u64)
    }

    /// Returns every transaction ordered by `date`, newest first. The ordering compares the stored
    /// text, so it is only chronological when the source dates sort lexically.
    pub(crate) async fn list_transactions(&self) -> Re<Vec<Transaction>> {
        let rows: Vec<TransactionRow> = sqlx::query_as(
            "SELECT id, date, description, amount, category, custom_category, currency, \
             account, memo FROM transactions ORDER BY date DESC",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to query transactions")?;
        rows.into_iter().map(Transaction::try_from).collect()
    }

    pub(crate) async fn get_transaction(&self, id: &str) -> Re<Option<Transaction>> {
        let row: Option<TransactionRow> = sqlx::query_as(
            "SELECT id, date, description, amount, category, custom_category, currency, \
             account, memo FROM transactions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to query transaction '{id}'"))?;
        row.map(Transaction::try_from).transpose()
    }

    /// Sets a single field of the transaction `id`. Returns the number of rows affected, which is
    /// zero when no such transaction exists.
    pub(crate) async fn update_field(
        &self,
        id: &str,
        field: TransactionField,
        value: &str,
    ) -> Re<u64> {
        let sql = format!("UPDATE transactions SET {} = ? WHERE id = ?", field.column());
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to update {field} of transaction '{id}'"))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Store for Db {
    async fn clear_transactions(&self) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM transactions")
            .execute(&self.pool)
            .await
            .context("Failed to clear transactions")?;
        debug!("Cleared {} transactions", result.rows_affected());
        Ok(result.rows_affected())
    }

    async fn insert_transactions(&self, transactions: &[Transaction]) -> anyhow::Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin insert transaction")?;

        for t in transactions {
            let amount = t
                .amount
                .to_f64()
                .with_context(|| format!("Amount {} cannot be stored", t.amount))?;
            sqlx::query(
                "INSERT INTO transactions (id, date, description, amount, category, \
                 custom_category, currency, account, memo) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&t.id)
            .bind(&t.date)
            .bind(&t.description)
            .bind(amount)
            .bind(&t.category)
            .bind(&t.custom_category)
            .bind(&t.currency)
            .bind(&t.account)
            .bind(&t.memo)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert transaction '{}'", t.id))?;
        }

        tx.commit()
            .await
            .context("Failed to commit inserted transactions")?;
        Ok(transactions.len() as u64)
    }
}

/// A row of the `transactions` table. Every column other than `id` is nullable because stores
/// written by older releases did not always fill them.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: String,
    date: Option<String>,
    description: Option<String>,
    amount: Option<f64>,
    category: Option<String>,
    custom_category: Option<String>,
    currency: Option<String>,
    account: Option<String>,
    memo: Option<String>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = anyhow::Error;

    /// A missing amount reads back as zero. An amount that does not fit a `Decimal` is an error.
    fn try_from(row: TransactionRow) -> Re<Self> {
        let amount = match row.amount {
            None => Decimal::ZERO,
            Some(value) => Decimal::from_f64(value).with_context(|| {
                format!(
                    "Stored amount {value} of transaction '{}' is out of range",
                    row.id
                )
            })?,
        };
        Ok(Transaction {
            id: row.id,
            date: row.date.unwrap_or_default(),
            description: row.description.unwrap_or_default(),
            amount,
            category: row.category.unwrap_or_default(),
            custom_category: row.custom_category,
            currency: row.currency.unwrap_or_default(),
            account: row.account,
            memo: row.memo,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_db() -> (TempDir, Db) {
        let dir = TempDir::new().unwrap();
        let db = Db::init(dir.path().join("test.sqlite")).await.unwrap();
        (dir, db)
    }

    fn txn(date: &str, description: &str, cents: i64) -> Transaction {
        Transaction::new(date, description, Decimal::new(cents, 2), "USD")
    }

    #[tokio::test]
    async fn test_init_refuses_existing_file() {
        let (dir, _db) = test_db().await;
        assert!(Db::init(dir.path().join("test.sqlite")).await.is_err());
    }

    #[tokio::test]
    async fn test_load_requires_file() {
        let dir = TempDir::new().unwrap();
        assert!(Db::load(dir.path().join("missing.sqlite")).await.is_err());
    }

    #[tokio::test]
    async fn test_insert_and_list_newest_first() {
        let (_dir, db) = test_db().await;
        let rows = vec![
            txn("2024-01-02", "Coffee", -450),
            txn("2024-03-01", "Paycheck", 120000),
            txn("2024-02-14", "Flowers", -2999),
        ];
        assert_eq!(db.insert_transactions(&rows).await.unwrap(), 3);
        assert_eq!(db.count_transactions().await.unwrap(), 3);

        let listed = db.list_transactions().await.unwrap();
        let dates: Vec<&str> = listed.iter().map(|t| t.date()).collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-02-14", "2024-01-02"]);
        assert_eq!(listed[2].amount(), Decimal::new(-450, 2));
        assert_eq!(listed[2].currency(), "USD");
        assert_eq!(listed[2].custom_category(), None);
    }

    #[tokio::test]
    async fn test_list_orders_lexically_not_by_calendar() {
        let (_dir, db) = test_db().await;
        let rows = vec![txn("12/01/2023", "Old", -100), txn("02/01/2024", "New", -100)];
        db.insert_transactions(&rows).await.unwrap();
        let listed = db.list_transactions().await.unwrap();
        assert_eq!(listed[0].description(), "Old");
    }

    #[tokio::test]
    async fn test_insert_is_atomic() {
        let (_dir, db) = test_db().await;
        let first = txn("2024-01-01", "A", -100);
        let mut duplicate = txn("2024-01-02", "B", -200);
        duplicate.id = first.id.clone();
        assert!(db.insert_transactions(&[first, duplicate]).await.is_err());
        assert_eq!(db.count_transactions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let (_dir, db) = test_db().await;
        db.insert_transactions(&[txn("d", "x", 1), txn("d", "y", 2)])
            .await
            .unwrap();
        assert_eq!(db.clear_transactions().await.unwrap(), 2);
        assert_eq!(db.count_transactions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_field() {
        let (_dir, db) = test_db().await;
        let t = txn("2024-01-01", "Groceries", -5000);
        let id = t.id().to_string();
        db.insert_transactions(&[t]).await.unwrap();

        let affected = db
            .update_field(&id, TransactionField::Category, "Food")
            .await
            .unwrap();
        assert_eq!(affected, 1);
        db.update_field(&id, TransactionField::Memo, "weekly shop")
            .await
            .unwrap();

        let found = db.get_transaction(&id).await.unwrap().unwrap();
        assert_eq!(found.custom_category(), Some("Food"));
        assert_eq!(found.category(), "");
        assert_eq!(found.memo(), Some("weekly shop"));
    }

    #[tokio::test]
    async fn test_update_unknown_id_affects_nothing() {
        let (_dir, db) = test_db().await;
        let affected = db
            .update_field("nope", TransactionField::Memo, "x")
            .await
            .unwrap();
        assert_eq!(affected, 0);
        assert!(db.get_transaction("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.sqlite");
        {
            let db = Db::init(&path).await.unwrap();
            db.insert_transactions(&[txn("d", "kept", 1)]).await.unwrap();
        }
        let db = Db::load(&path).await.unwrap();
        assert_eq!(db.count_transactions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_amount_is_an_error() {
        let (_dir, db) = test_db().await;
        sqlx::query("INSERT INTO transactions (id, date, description, amount) VALUES (?, ?, ?, ?)")
            .bind("huge")
            .bind("2024-01-01")
            .bind("Too big")
            .bind(1e30_f64)
            .execute(&db.pool)
            .await
            .unwrap();

        let err = db.list_transactions().await.unwrap_err();
        assert!(format!("{err:#}").contains("out of range"));
        assert!(db.get_transaction("huge").await.is_err());
    }

    #[tokio::test]
    async fn test_null_amount_reads_as_zero() {
        let (_dir, db) = test_db().await;
        sqlx::query("INSERT INTO transactions (id, date, description) VALUES (?, ?, ?)")
            .bind("legacy")
            .bind("2024-01-01")
            .bind("No amount")
            .execute(&db.pool)
            .await
            .unwrap();

        let found = db.get_transaction("legacy").await.unwrap().unwrap();
        assert!(found.amount().is_zero());
    }
}
