use crate::aggregator::{AggregationReport, ResultAggregator};
use crate::catalog::ProjectCatalog;
use crate::config::EngineConfig;
use crate::errors::{AggregationError, LedgerError, SettlementError};
use crate::ledger::WalletLedger;
use crate::models::{
    AccountId, ProjectResult, SettlementOutcome, SplitPayment, Transaction, TxReceipt, VoteKind,
    VoterRole,
};
use crate::results::ResultStore;
use crate::settlement::{SettlementDispatcher, SplitPaymentStore};
use crate::tx_log::{InMemoryTxLog, TransactionStore};
use crate::vote_store::VoteStore;
use anyhow::Result;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;

/// Facade wiring the ledger, vote store, aggregator and dispatcher together.
/// Callers (CLI, server) only ever talk to this.
#[derive(Clone)]
pub struct FundingEngine {
    ledger: WalletLedger,
    votes: VoteStore,
    results: Arc<ResultStore>,
    splits: Arc<SplitPaymentStore>,
    aggregator: ResultAggregator,
    dispatcher: SettlementDispatcher,
}

impl FundingEngine {
    pub async fn new(
        config: EngineConfig,
        catalog: Arc<dyn ProjectCatalog>,
        journal_path: PathBuf,
    ) -> Result<Self> {
        let tx_log: Arc<dyn TransactionStore> = Arc::new(InMemoryTxLog::new());
        let ledger = WalletLedger::new(journal_path, config.num_shards, tx_log).await?;
        let votes = VoteStore::new(config.num_shards);
        let results = Arc::new(ResultStore::new());
        let splits = Arc::new(SplitPaymentStore::new());

        let aggregator = ResultAggregator::new(
            config.clone(),
            votes.clone(),
            catalog.clone(),
            results.clone(),
        );
        let dispatcher =
            SettlementDispatcher::new(ledger.clone(), catalog, results.clone(), splits.clone());

        Ok(Self {
            ledger,
            votes,
            results,
            splits,
            aggregator,
            dispatcher,
        })
    }

    // ---- wallet ----

    pub async fn create_account(&self, account: &str, initial: Decimal) -> Result<(), LedgerError> {
        self.ledger.create_account(account, initial).await
    }

    pub async fn credit(&self, account: &str, amount: Decimal) -> Result<TxReceipt, LedgerError> {
        self.ledger.credit(account, amount, None).await
    }

    pub async fn debit(&self, account: &str, amount: Decimal) -> Result<TxReceipt, LedgerError> {
        self.ledger.debit(account, amount, None).await
    }

    pub async fn balance(&self, account: &str) -> Result<Decimal, LedgerError> {
        self.ledger.balance(account).await
    }

    pub async fn transactions(&self, account: &str) -> Result<Vec<Transaction>, LedgerError> {
        self.ledger.transactions(account).await
    }

    pub async fn all_balances(&self) -> Vec<(AccountId, Decimal)> {
        self.ledger.all_balances().await
    }

    /// Rebuild ledger state from the journal (on startup).
    pub async fn rebuild_from_journal(&self) -> Result<()> {
        self.ledger.rebuild_from_journal().await
    }

    // ---- voting ----

    pub async fn cast_vote(
        &self,
        project: &str,
        voter: &str,
        role: VoterRole,
        kind: VoteKind,
    ) -> Result<()> {
        self.votes.cast_vote(project, voter, role, kind).await
    }

    // ---- results ----

    pub async fn compute_results(
        &self,
        hackathon: &str,
    ) -> Result<AggregationReport, AggregationError> {
        self.aggregator.compute_results(hackathon).await
    }

    pub async fn results_for(&self, hackathon: &str) -> Vec<ProjectResult> {
        self.results.for_hackathon(hackathon).await
    }

    pub async fn result_for(&self, hackathon: &str, project: &str) -> Option<ProjectResult> {
        self.results.get(hackathon, project).await
    }

    // ---- settlement ----

    pub async fn settle(
        &self,
        hackathon: &str,
        project: &str,
    ) -> Result<SettlementOutcome, SettlementError> {
        self.dispatcher.settle(hackathon, project).await
    }

    /// Record an externally supplied proof-of-payment hash on the latest
    /// settlement attempt.
    pub async fn attach_proof(&self, project: &str, transaction_hash: &str) -> bool {
        self.splits.attach_proof(project, transaction_hash).await
    }

    pub async fn split_payments(&self, project: &str) -> Vec<SplitPayment> {
        self.splits.list(project).await
    }
}
