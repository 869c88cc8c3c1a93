use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;
use ledgerline_core::{
    beancount, Account, AccountName, LedgerError, LedgerRow, Money, Posting, ValidatedTransaction,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use thiserror::Error;

pub type DbPool = Pool<Sqlite>;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("Amount out of range: {0}")]
    AmountOutOfRange(Money),
    #[error("Corrupt ledger row: {0}")]
    Corrupt(String),
}

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    prepare(&pool).await?;
    Ok(pool)
}

/// A private in-memory database; one connection so every query sees the same data.
pub async fn in_memory_db() -> Result<DbPool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    prepare(&pool).await?;
    Ok(pool)
}

async fn prepare(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;
    run_migrations(pool).await
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            currencies TEXT NOT NULL,
            opened TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            flag TEXT NOT NULL DEFAULT '*',
            payee TEXT,
            narration TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS postings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            account TEXT NOT NULL,
            units_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            FOREIGN KEY (transaction_id) REFERENCES transactions(id) ON DELETE CASCADE,
            FOREIGN KEY (account) REFERENCES accounts(name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS receipts (
            hash TEXT PRIMARY KEY,
            transaction_id INTEGER NOT NULL,
            filename TEXT NOT NULL,
            FOREIGN KEY (transaction_id) REFERENCES transactions(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Append-only ledger: transactions are added and listed, never edited.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    pool: DbPool,
}

impl LedgerStore {
    /// Wraps a prepared pool and opens the default accounts.
    pub async fn new(pool: DbPool) -> Result<Self, StorageError> {
        let store = Self { pool };
        store.ensure_accounts().await?;
        Ok(store)
    }

    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        Self::new(create_db(path).await?).await
    }

    pub async fn in_memory() -> Result<Self, StorageError> {
        Self::new(in_memory_db().await?).await
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Opens every default account that is not open yet.
    pub async fn ensure_accounts(&self) -> Result<(), StorageError> {
        for account in Account::defaults() {
            sqlx::query("INSERT OR IGNORE INTO accounts (name, currencies, opened) VALUES (?, ?, ?)")
                .bind(account.name.as_str())
                .bind(account.currencies.join(","))
                .bind(account.opened.format(DATE_FORMAT).to_string())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    pub async fn accounts(&self) -> Result<Vec<Account>, StorageError> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            "SELECT name, currencies, opened FROM accounts ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(name, currencies, opened)| -> Result<Account, StorageError> {
                Ok(Account {
                    name: name.parse()?,
                    currencies: currencies
                        .split(',')
                        .filter(|c| !c.is_empty())
                        .map(str::to_string)
                        .collect(),
                    opened: parse_date(&opened)?,
                })
            })
            .collect()
    }

    /// Appends a transaction and its postings atomically. Every posting must
    /// name an open account.
    pub async fn add_transaction(&self, tx: &ValidatedTransaction) -> Result<i64, StorageError> {
        self.insert(tx, None).await
    }

    /// Appends the transaction for a receipt document and records the
    /// document's content hash in the same database transaction, so a hash
    /// is only ever marked processed once its posting is stored.
    pub async fn add_receipt(
        &self,
        tx: &ValidatedTransaction,
        hash_hex: &str,
        filename: &str,
    ) -> Result<i64, StorageError> {
        self.insert(tx, Some((hash_hex, filename))).await
    }

    /// Whether a receipt with this content hash has already been posted.
    pub async fn has_receipt(&self, hash_hex: &str) -> Result<bool, StorageError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT transaction_id FROM receipts WHERE hash = ?")
            .bind(hash_hex)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn insert(
        &self,
        tx: &ValidatedTransaction,
        receipt: Option<(&str, &str)>,
    ) -> Result<i64, StorageError> {
        let open: HashSet<String> = self
            .accounts()
            .await?
            .into_iter()
            .map(|a| a.name.to_string())
            .collect();
        if let Some(p) = tx.postings.iter().find(|p| !open.contains(p.account.as_str())) {
            return Err(LedgerError::UnknownAccount(p.account.to_string()).into());
        }

        let legs = tx
            .postings
            .iter()
            .map(|p| {
                p.units
                    .to_cents()
                    .map(|cents| (p, cents))
                    .ok_or(StorageError::AmountOutOfRange(p.units))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut db_tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO transactions (date, flag, payee, narration) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(tx.date.format(DATE_FORMAT).to_string())
        .bind(tx.flag.to_string())
        .bind(&tx.payee)
        .bind(&tx.narration)
        .fetch_one(&mut *db_tx)
        .await?;

        for (position, (posting, cents)) in legs.into_iter().enumerate() {
            sqlx::query(
                "INSERT INTO postings (transaction_id, position, account, units_cents, currency) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(position as i64)
            .bind(posting.account.as_str())
            .bind(cents)
            .bind(&posting.currency)
            .execute(&mut *db_tx)
            .await?;
        }

        if let Some((hash_hex, filename)) = receipt {
            sqlx::query("INSERT INTO receipts (hash, transaction_id, filename) VALUES (?, ?, ?)")
                .bind(hash_hex)
                .bind(id)
                .bind(filename)
                .execute(&mut *db_tx)
                .await?;
        }

        db_tx.commit().await?;
        tracing::info!(id, date = %tx.date, payee = ?tx.payee, total = %tx.balanced_total, "transaction recorded");
        Ok(id)
    }

    /// Every transaction in insertion order, reported by its first posting.
    pub async fn list_transactions(&self) -> Result<Vec<LedgerRow>, StorageError> {
        let rows = sqlx::query_as::<_, (String, Option<String>, i64, String)>(
            r#"
            SELECT t.date, t.payee, p.units_cents, p.currency
            FROM transactions t
            JOIN postings p ON p.transaction_id = t.id AND p.position = 0
            ORDER BY t.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(date, payee, cents, currency)| LedgerRow {
                date,
                payee,
                amount: format!("{:.2}", Money::from_cents(cents).amount()),
                currency,
            })
            .collect())
    }

    /// Loads full transactions with all postings, in insertion order.
    pub async fn transactions(&self) -> Result<Vec<ValidatedTransaction>, StorageError> {
        let headers = sqlx::query_as::<_, (i64, String, String, Option<String>, String)>(
            "SELECT id, date, flag, payee, narration FROM transactions ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let postings = sqlx::query_as::<_, (i64, String, i64, String)>(
            "SELECT transaction_id, account, units_cents, currency FROM postings ORDER BY transaction_id, position",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(headers.len());
        for (id, date, flag, payee, narration) in headers {
            let legs = postings
                .iter()
                .filter(|(tx_id, ..)| *tx_id == id)
                .map(|(_, account, cents, currency)| -> Result<Posting, StorageError> {
                    let account: AccountName = account.parse()?;
                    Ok(Posting::new(account, Money::from_cents(*cents), currency))
                })
                .collect::<Result<Vec<_>, StorageError>>()?;

            let balanced_total = legs
                .iter()
                .filter(|p| !p.units.is_negative())
                .map(|p| p.units)
                .sum();

            out.push(ValidatedTransaction {
                id: Some(id),
                date: parse_date(&date)?,
                flag: flag.chars().next().unwrap_or('*'),
                payee,
                narration,
                postings: legs,
                balanced_total,
            });
        }
        Ok(out)
    }

    /// The whole ledger as a beancount file.
    pub async fn export_beancount(&self) -> Result<String, StorageError> {
        let accounts = self.accounts().await?;
        let transactions = self.transactions().await?;
        Ok(beancount::render(&accounts, &transactions))
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, StorageError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| StorageError::Corrupt(format!("date {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerline_core::{UnvalidatedTransaction, CHECKING};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn receipt(merchant: &str, cents: i64, date: NaiveDate) -> ValidatedTransaction {
        ValidatedTransaction::from_receipt(Some(merchant), Money::from_cents(cents), date).unwrap()
    }

    #[tokio::test]
    async fn fresh_store_has_default_accounts_only() {
        let store = LedgerStore::in_memory().await.unwrap();
        let names: Vec<_> = store.accounts().await.unwrap().into_iter().map(|a| a.name.to_string()).collect();
        assert_eq!(names, vec!["Assets:Checking", "Expenses:Receipts"]);
        assert!(store.list_transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ensure_accounts_is_idempotent() {
        let store = LedgerStore::in_memory().await.unwrap();
        store.ensure_accounts().await.unwrap();
        store.ensure_accounts().await.unwrap();
        assert_eq!(store.accounts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn add_then_list_in_insertion_order() {
        let store = LedgerStore::in_memory().await.unwrap();
        store.add_transaction(&receipt("Walmart", 4567, d(2024, 1, 15))).await.unwrap();
        store.add_transaction(&receipt("Local Coffee Shop", 1599, d(2024, 1, 18))).await.unwrap();
        store.add_transaction(&receipt("Earlier", 100, d(2023, 12, 1))).await.unwrap();

        let rows = store.list_transactions().await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0],
            LedgerRow {
                date: "2024-01-15".into(),
                payee: Some("Walmart".into()),
                amount: "45.67".into(),
                currency: "USD".into(),
            }
        );
        assert_eq!(rows[1].payee.as_deref(), Some("Local Coffee Shop"));
        assert_eq!(rows[2].date, "2023-12-01");
    }

    #[tokio::test]
    async fn rejects_posting_to_unopened_account() {
        let store = LedgerStore::in_memory().await.unwrap();
        let tx = ValidatedTransaction::validate(UnvalidatedTransaction {
            date: d(2024, 1, 1),
            flag: '*',
            payee: None,
            narration: "Dinner".into(),
            postings: vec![
                Posting::new("Expenses:Meals".parse().unwrap(), Money::from_cents(500), "USD"),
                Posting::new(CHECKING.parse().unwrap(), Money::from_cents(-500), "USD"),
            ],
        })
        .unwrap();

        let err = store.add_transaction(&tx).await.unwrap_err();
        assert!(matches!(err, StorageError::Ledger(LedgerError::UnknownAccount(ref a)) if a == "Expenses:Meals"));
        assert!(store.list_transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transactions_roundtrip_postings() {
        let store = LedgerStore::in_memory().await.unwrap();
        let original = receipt("Walmart", 4567, d(2024, 1, 15));
        let id = store.add_transaction(&original).await.unwrap();

        let loaded = store.transactions().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, Some(id));
        assert_eq!(loaded[0].postings, original.postings);
        assert_eq!(loaded[0].balanced_total, original.balanced_total);
        assert_eq!(loaded[0].narration, original.narration);
    }

    #[tokio::test]
    async fn export_beancount_contains_opens_and_transactions() {
        let store = LedgerStore::in_memory().await.unwrap();
        store.add_transaction(&receipt("Walmart", 4567, d(2024, 1, 15))).await.unwrap();

        let text = store.export_beancount().await.unwrap();
        assert!(text.starts_with("1970-01-01 open Assets:Checking USD"));
        assert!(text.contains("2024-01-15 * \"Walmart\" \"Receipt from email\""));
        assert!(text.contains("  Assets:Checking  -45.67 USD"));
    }

    #[tokio::test]
    async fn receipt_hash_is_recorded_with_its_posting() {
        let store = LedgerStore::in_memory().await.unwrap();
        let hash = "ab".repeat(32);
        assert!(!store.has_receipt(&hash).await.unwrap());

        store
            .add_receipt(&receipt("Walmart", 4567, d(2024, 1, 15)), &hash, "walmart.pdf")
            .await
            .unwrap();

        assert!(store.has_receipt(&hash).await.unwrap());
        assert!(!store.has_receipt(&"cd".repeat(32)).await.unwrap());
        assert_eq!(store.list_transactions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_receipt_posting_leaves_nothing_behind() {
        let store = LedgerStore::in_memory().await.unwrap();
        let hash = "ef".repeat(32);
        let huge = Money::from_decimal("99999999999999999999.00".parse().unwrap());
        let tx = ValidatedTransaction::from_receipt(Some("Big Spender"), huge, d(2024, 1, 15)).unwrap();

        let err = store.add_receipt(&tx, &hash, "huge.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::AmountOutOfRange(_)));
        assert!(!store.has_receipt(&hash).await.unwrap());
        assert!(store.list_transactions().await.unwrap().is_empty());

        store
            .add_receipt(&receipt("Big Spender", 4567, d(2024, 1, 15)), &hash, "huge.pdf")
            .await
            .unwrap();
        assert!(store.has_receipt(&hash).await.unwrap());
    }

    #[tokio::test]
    async fn same_receipt_hash_cannot_be_posted_twice() {
        let store = LedgerStore::in_memory().await.unwrap();
        let hash = "12".repeat(32);
        let tx = receipt("Walmart", 4567, d(2024, 1, 15));
        store.add_receipt(&tx, &hash, "a.pdf").await.unwrap();

        let err = store.add_receipt(&tx, &hash, "b.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::Db(_)));
        assert_eq!(store.list_transactions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        {
            let store = LedgerStore::open(&path).await.unwrap();
            store.add_transaction(&receipt("Walmart", 4567, d(2024, 1, 15))).await.unwrap();
            store.pool().close().await;
        }
        let store = LedgerStore::open(&path).await.unwrap();
        assert_eq!(store.list_transactions().await.unwrap().len(), 1);
        assert_eq!(store.accounts().await.unwrap().len(), 2);
    }
}
