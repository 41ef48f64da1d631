use crate::errors::LedgerError;
use crate::journal::{Journal, JournalOp};
use crate::models::{AccountId, Transaction, TxKind, TxReceipt};
use crate::shard_manager::ShardManager;
use crate::tx_log::TransactionStore;
use anyhow::Result;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::warn;

/// The wallet ledger service. Sole writer of account balances and the
/// transaction log; everything settlement-related goes through here.
#[derive(Clone)]
pub struct WalletLedger {
    shards: Arc<ShardManager>,
    tx_log: Arc<dyn TransactionStore>,
    journal: Arc<Journal>,
    tx_seq: Arc<AtomicU64>,
}

impl WalletLedger {
    pub async fn new(
        journal_path: PathBuf,
        num_shards: usize,
        tx_log: Arc<dyn TransactionStore>,
    ) -> Result<Self> {
        let journal = Arc::new(Journal::new(journal_path).await?);
        let tx_seq = Arc::new(AtomicU64::new(1));
        let shards = Arc::new(ShardManager::new(
            num_shards,
            tx_log.clone(),
            journal.clone(),
            tx_seq.clone(),
        ));

        Ok(Self {
            shards,
            tx_log,
            journal,
            tx_seq,
        })
    }

    /// Create an account with the given starting balance (zero for a fresh
    /// wallet). Fails with `AlreadyExists` if the id is taken.
    pub async fn create_account(&self, account: &str, initial: Decimal) -> Result<(), LedgerError> {
        if initial < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        self.shards.create(account, initial).await?;

        if let Err(e) = self
            .journal
            .append(&JournalOp::Create {
                account: account.to_string(),
                initial,
            })
            .await
        {
            warn!(account = %account, error = ?e, "Failed to journal account creation");
            return Err(LedgerError::Storage);
        }

        Ok(())
    }

    pub async fn credit(
        &self,
        account: &str,
        amount: Decimal,
        reference: Option<String>,
    ) -> Result<TxReceipt, LedgerError> {
        let handle = self.shards.handle(account).await?;
        handle.credit(amount, reference).await
    }

    pub async fn debit(
        &self,
        account: &str,
        amount: Decimal,
        reference: Option<String>,
    ) -> Result<TxReceipt, LedgerError> {
        let handle = self.shards.handle(account).await?;
        handle.debit(amount, reference).await
    }

    pub async fn balance(&self, account: &str) -> Result<Decimal, LedgerError> {
        let handle = self.shards.handle(account).await?;
        handle.balance().await
    }

    /// Ordered transaction history for one account.
    pub async fn transactions(&self, account: &str) -> Result<Vec<Transaction>, LedgerError> {
        // Existence check first so unknown accounts error rather than
        // returning an empty history.
        self.shards.handle(account).await?;
        Ok(self.tx_log.for_account(account).await)
    }

    pub async fn all_balances(&self) -> Vec<(AccountId, Decimal)> {
        self.shards.all_balances().await
    }

    /// Rebuild balances and the transaction log from the journal (on
    /// startup, before any live traffic). The journal holds only successful
    /// ops in per-account execution order, so a plain fold reproduces the
    /// exact final state.
    pub async fn rebuild_from_journal(&self) -> Result<()> {
        let ops = self.journal.replay().await?;

        let mut balances: HashMap<AccountId, Decimal> = HashMap::new();
        let mut entries: Vec<Transaction> = Vec::new();

        for op in ops {
            match op {
                JournalOp::Create { account, initial } => {
                    balances.entry(account).or_insert(initial);
                }
                JournalOp::Credit {
                    account,
                    amount,
                    reference,
                } => {
                    let Some(balance) = balances.get_mut(&account) else {
                        continue;
                    };
                    *balance += amount;
                    entries.push(Transaction {
                        id: self.tx_seq.fetch_add(1, Ordering::SeqCst),
                        account,
                        kind: TxKind::Credit,
                        amount,
                        at: SystemTime::now(),
                        reference,
                    });
                }
                JournalOp::Debit {
                    account,
                    amount,
                    reference,
                } => {
                    let Some(balance) = balances.get_mut(&account) else {
                        continue;
                    };
                    if *balance < amount {
                        warn!(account = %account, "Journal debit would overdraw, skipping");
                        continue;
                    }
                    *balance -= amount;
                    entries.push(Transaction {
                        id: self.tx_seq.fetch_add(1, Ordering::SeqCst),
                        account,
                        kind: TxKind::Debit,
                        amount,
                        at: SystemTime::now(),
                        reference,
                    });
                }
            }
        }

        for tx in entries {
            self.tx_log.append(tx).await?;
        }

        // Seed actors directly; going through create_account would journal
        // the creations a second time.
        for (account, balance) in balances {
            let _ = self.shards.create(&account, balance).await;
        }

        Ok(())
    }
}
