use crate::models::Transaction;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Trait for transaction log backends. The log is append-only: entries are
/// never updated or removed once written.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn append(&self, tx: Transaction) -> Result<()>;
    async fn for_account(&self, account: &str) -> Vec<Transaction>;
    async fn len(&self) -> usize;
}

/// In-memory log, the default backend for CLI and server modes.
pub struct InMemoryTxLog {
    entries: Arc<RwLock<Vec<Transaction>>>,
}

impl InMemoryTxLog {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryTxLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTxLog {
    async fn append(&self, tx: Transaction) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.push(tx);
        Ok(())
    }

    async fn for_account(&self, account: &str) -> Vec<Transaction> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|tx| tx.account == account)
            .cloned()
            .collect()
    }

    async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }
}
