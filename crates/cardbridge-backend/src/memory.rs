//! In-memory transaction store

use async_trait::async_trait;
use cardbridge_core::{StoreError, Transaction, TransactionStore};
use parking_lot::RwLock;

/// In-memory transaction store
///
/// Fast, volatile storage suitable for development and kiosks that do not
/// keep history across restarts. Data is lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<Transaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored transactions.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn save(&self, tx: &Transaction) -> Result<(), StoreError> {
        self.records.write().push(tx.clone());
        Ok(())
    }

    async fn history(&self) -> Result<Vec<Transaction>, StoreError> {
        let records = self.records.read();
        Ok(records.iter().rev().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_history_newest_first() {
        let store = MemoryStore::new();

        store
            .save(&Transaction::new("Lunch", "tok-1", 4.5, None))
            .await
            .unwrap();
        store
            .save(&Transaction::new("Bus", "tok-2", 2.0, Some("Completed".into())))
            .await
            .unwrap();

        let history = store.history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].name, "Bus");
        assert_eq!(history[1].name, "Lunch");
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = MemoryStore::new();

        assert!(store.is_empty());
        assert!(store.history().await.unwrap().is_empty());
    }
}
