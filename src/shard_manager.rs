use crate::errors::LedgerError;
use crate::journal::Journal;
use crate::models::AccountId;
use crate::tx_log::TransactionStore;
use crate::wallet_actor::{WalletActor, WalletHandle};
use rust_decimal::Decimal;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Hash-sharded registry of wallet actors. Different accounts mutate in
/// parallel; a given account always routes to the same single-writer actor.
pub struct ShardManager {
    shards: Vec<Arc<RwLock<Shard>>>,
    num_shards: usize,
    tx_log: Arc<dyn TransactionStore>,
    journal: Arc<Journal>,
    tx_seq: Arc<AtomicU64>,
}

struct Shard {
    actors: HashMap<AccountId, WalletHandle>,
}

impl ShardManager {
    pub fn new(
        num_shards: usize,
        tx_log: Arc<dyn TransactionStore>,
        journal: Arc<Journal>,
        tx_seq: Arc<AtomicU64>,
    ) -> Self {
        let shards = (0..num_shards)
            .map(|_| {
                Arc::new(RwLock::new(Shard {
                    actors: HashMap::new(),
                }))
            })
            .collect();

        Self {
            shards,
            num_shards,
            tx_log,
            journal,
            tx_seq,
        }
    }

    fn shard_for(&self, account: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        account.hash(&mut hasher);
        (hasher.finish() as usize) % self.num_shards
    }

    /// Register a new account actor. Unlike a get-or-create registry, an
    /// existing account is an error: account creation is an explicit
    /// operation in the wallet protocol.
    pub async fn create(&self, account: &str, initial: Decimal) -> Result<(), LedgerError> {
        let shard = &self.shards[self.shard_for(account)];

        let mut shard_lock = shard.write().await;

        if shard_lock.actors.contains_key(account) {
            return Err(LedgerError::AlreadyExists);
        }

        let (tx, rx) = mpsc::channel(1000);
        let handle = WalletHandle::new(tx);

        let actor = WalletActor::new(
            account.to_string(),
            initial,
            rx,
            self.tx_log.clone(),
            self.journal.clone(),
            self.tx_seq.clone(),
        );

        tokio::spawn(async move {
            actor.run().await;
        });

        shard_lock.actors.insert(account.to_string(), handle);
        Ok(())
    }

    /// Look up the actor for an existing account.
    pub async fn handle(&self, account: &str) -> Result<WalletHandle, LedgerError> {
        let shard = &self.shards[self.shard_for(account)];

        let shard_lock = shard.read().await;
        shard_lock
            .actors
            .get(account)
            .cloned()
            .ok_or(LedgerError::AccountNotFound)
    }

    /// Collect every account balance, shard by shard in parallel.
    pub async fn all_balances(&self) -> Vec<(AccountId, Decimal)> {
        use futures::future::join_all;

        let futures: Vec<_> = self
            .shards
            .iter()
            .map(|shard| async move {
                let shard_lock = shard.read().await;
                let mut balances = Vec::new();

                for (account, handle) in shard_lock.actors.iter() {
                    if let Ok(balance) = handle.balance().await {
                        balances.push((account.clone(), balance));
                    }
                }

                balances
            })
            .collect();

        let results = join_all(futures).await;
        results.into_iter().flatten().collect()
    }
}
