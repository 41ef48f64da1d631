use crate::errors::LedgerError;
use crate::journal::{Journal, JournalOp};
use crate::models::{AccountId, Transaction, TxId, TxKind, TxReceipt};
use crate::tx_log::TransactionStore;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{mpsc, oneshot};
use tracing::error;

pub enum WalletMessage {
    Credit {
        amount: Decimal,
        reference: Option<String>,
        reply: oneshot::Sender<Result<TxReceipt, LedgerError>>,
    },
    Debit {
        amount: Decimal,
        reference: Option<String>,
        reply: oneshot::Sender<Result<TxReceipt, LedgerError>>,
    },
    Balance {
        reply: oneshot::Sender<Decimal>,
    },
}

/// Single writer for one account. All balance mutations for the account go
/// through this actor's mailbox, so the read-check-write sequence in a debit
/// is atomic and the balance always equals the signed sum of logged entries.
pub struct WalletActor {
    account: AccountId,
    balance: Decimal,
    tx_log: Arc<dyn TransactionStore>,
    journal: Arc<Journal>,
    tx_seq: Arc<AtomicU64>,
    receiver: mpsc::Receiver<WalletMessage>,
}

impl WalletActor {
    pub fn new(
        account: AccountId,
        initial: Decimal,
        receiver: mpsc::Receiver<WalletMessage>,
        tx_log: Arc<dyn TransactionStore>,
        journal: Arc<Journal>,
        tx_seq: Arc<AtomicU64>,
    ) -> Self {
        Self {
            account,
            balance: initial,
            tx_log,
            journal,
            tx_seq,
            receiver,
        }
    }

    /// Run the actor event loop. The actor lives as long as its handle is
    /// registered; accounts are never deleted, only drained to zero.
    pub async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                WalletMessage::Credit {
                    amount,
                    reference,
                    reply,
                } => {
                    let result = self.apply(TxKind::Credit, amount, reference).await;
                    let _ = reply.send(result);
                }
                WalletMessage::Debit {
                    amount,
                    reference,
                    reply,
                } => {
                    let result = self.apply(TxKind::Debit, amount, reference).await;
                    let _ = reply.send(result);
                }
                WalletMessage::Balance { reply } => {
                    let _ = reply.send(self.balance);
                }
            }
        }

        tracing::debug!("Actor for account {} terminated", self.account);
    }

    async fn apply(
        &mut self,
        kind: TxKind,
        amount: Decimal,
        reference: Option<String>,
    ) -> Result<TxReceipt, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        if kind == TxKind::Debit && self.balance < amount {
            return Err(LedgerError::InsufficientFunds);
        }

        let tx = Transaction {
            id: self.tx_seq.fetch_add(1, Ordering::SeqCst),
            account: self.account.clone(),
            kind,
            amount,
            at: SystemTime::now(),
            reference: reference.clone(),
        };

        // Journal inside the critical section so per-account replay order
        // matches execution order. Nothing is mutated until both writes land.
        let journal_op = match kind {
            TxKind::Credit => JournalOp::Credit {
                account: self.account.clone(),
                amount,
                reference,
            },
            TxKind::Debit => JournalOp::Debit {
                account: self.account.clone(),
                amount,
                reference,
            },
        };

        if let Err(e) = self.journal.append(&journal_op).await {
            error!(account = %self.account, error = ?e, "Failed to journal transaction");
            return Err(LedgerError::Storage);
        }

        if let Err(e) = self.tx_log.append(tx.clone()).await {
            error!(account = %self.account, error = ?e, "Failed to append to transaction log");
            return Err(LedgerError::Storage);
        }

        self.balance += tx.signed_amount();

        Ok(TxReceipt {
            tx_id: tx.id,
            balance: self.balance,
        })
    }
}

#[derive(Clone)]
pub struct WalletHandle {
    sender: mpsc::Sender<WalletMessage>,
}

impl WalletHandle {
    pub fn new(sender: mpsc::Sender<WalletMessage>) -> Self {
        Self { sender }
    }

    pub async fn credit(
        &self,
        amount: Decimal,
        reference: Option<String>,
    ) -> Result<TxReceipt, LedgerError> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.sender
            .send(WalletMessage::Credit {
                amount,
                reference,
                reply: reply_tx,
            })
            .await
            .map_err(|_| LedgerError::ChannelClosed)?;

        reply_rx.await.map_err(|_| LedgerError::ChannelClosed)?
    }

    pub async fn debit(
        &self,
        amount: Decimal,
        reference: Option<String>,
    ) -> Result<TxReceipt, LedgerError> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.sender
            .send(WalletMessage::Debit {
                amount,
                reference,
                reply: reply_tx,
            })
            .await
            .map_err(|_| LedgerError::ChannelClosed)?;

        reply_rx.await.map_err(|_| LedgerError::ChannelClosed)?
    }

    pub async fn balance(&self) -> Result<Decimal, LedgerError> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.sender
            .send(WalletMessage::Balance { reply: reply_tx })
            .await
            .map_err(|_| LedgerError::ChannelClosed)?;

        reply_rx.await.map_err(|_| LedgerError::ChannelClosed)
    }
}
