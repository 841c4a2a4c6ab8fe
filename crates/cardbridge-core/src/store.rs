//! Transaction store seam

use crate::error::StoreError;
use crate::types::Transaction;
use async_trait::async_trait;

/// Persistence for processed transactions
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persist one transaction.
    async fn save(&self, tx: &Transaction) -> Result<(), StoreError>;

    /// All stored transactions, most recent first.
    async fn history(&self) -> Result<Vec<Transaction>, StoreError>;
}
