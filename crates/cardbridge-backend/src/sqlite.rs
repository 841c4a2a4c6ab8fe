//! SQLite transaction store

use async_trait::async_trait;
use cardbridge_core::{StoreError, Transaction, TransactionStore};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// SQLite transaction store
///
/// Embedded persistence for deployments that keep history across restarts.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Backend(e.to_string()))?;

        let store = Self {
            conn: Mutex::new(conn),
        };

        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Backend(e.to_string()))?;

        let store = Self {
            conn: Mutex::new(conn),
        };

        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                token TEXT NOT NULL,
                amount REAL NOT NULL,
                status TEXT,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_created_at ON transactions(created_at);
            "#,
        )
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl TransactionStore for SqliteStore {
    async fn save(&self, tx: &Transaction) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            INSERT INTO transactions (name, token, amount, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![tx.name, tx.token, tx.amount, tx.status, tx.created_at as i64],
        )
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn history(&self) -> Result<Vec<Transaction>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT name, token, amount, status, created_at FROM transactions \
                 ORDER BY created_at DESC, id DESC",
            )
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let records = stmt
            .query_map([], |row| {
                Ok(Transaction {
                    name: row.get(0)?,
                    token: row.get(1)?,
                    amount: row.get(2)?,
                    status: row.get(3)?,
                    created_at: row.get::<_, i64>(4)? as u64,
                })
            })
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx_at(name: &str, created_at: u64) -> Transaction {
        Transaction {
            name: name.into(),
            token: format!("tok-{}", name),
            amount: 1.0,
            status: None,
            created_at,
        }
    }

    #[tokio::test]
    async fn test_round_trip_newest_first() {
        let store = SqliteStore::in_memory().unwrap();

        store.save(&tx_at("first", 100)).await.unwrap();
        store.save(&tx_at("second", 200)).await.unwrap();

        let history = store.history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].name, "second");
        assert_eq!(history[1].name, "first");
        assert_eq!(history[1].created_at, 100);
    }

    #[tokio::test]
    async fn test_same_timestamp_orders_by_insertion() {
        let store = SqliteStore::in_memory().unwrap();

        store.save(&tx_at("a", 100)).await.unwrap();
        store.save(&tx_at("b", 100)).await.unwrap();

        let history = store.history().await.unwrap();
        assert_eq!(history[0].name, "b");
        assert_eq!(history[1].name, "a");
    }

    #[tokio::test]
    async fn test_status_round_trips() {
        let store = SqliteStore::in_memory().unwrap();

        let mut with_status = tx_at("paid", 10);
        with_status.status = Some("Completed".into());
        store.save(&with_status).await.unwrap();
        store.save(&tx_at("bare", 20)).await.unwrap();

        let history = store.history().await.unwrap();
        assert!(history[0].status.is_none());
        assert_eq!(history[1].status.as_deref(), Some("Completed"));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            store.save(&tx_at("kept", 5)).await.unwrap();
        }

        let reopened = SqliteStore::new(&path).unwrap();
        let history = reopened.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].name, "kept");
    }
}
