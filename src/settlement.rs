use crate::catalog::ProjectCatalog;
use crate::errors::SettlementError;
use crate::ledger::WalletLedger;
use crate::models::{ProjectId, SettlementOutcome, SplitPayment, SplitStatus, TxId, VotingStatus};
use crate::results::ResultStore;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::error;

/// Split-payment rows, one per settlement attempt per project. Status is
/// monotonic: a row leaves `pending` exactly once.
pub struct SplitPaymentStore {
    rows: RwLock<HashMap<ProjectId, Vec<SplitPayment>>>,
    seq: AtomicU64,
}

impl SplitPaymentStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            seq: AtomicU64::new(1),
        }
    }

    /// Open a new pending attempt and return its id.
    pub async fn open(
        &self,
        project: &str,
        total: Decimal,
        contributor_share: Decimal,
        maintainer_share: Decimal,
    ) -> u64 {
        let id = self.seq.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.write().await;
        rows.entry(project.to_string()).or_default().push(SplitPayment {
            id,
            project: project.to_string(),
            total_amount: total,
            contributor_share,
            maintainer_share,
            transaction_hash: None,
            status: SplitStatus::Pending,
            contributor_tx: None,
            maintainer_tx: None,
            failure_reason: None,
            created_at: SystemTime::now(),
        });
        id
    }

    pub async fn complete(&self, project: &str, id: u64, contributor_tx: TxId, maintainer_tx: TxId) {
        let mut rows = self.rows.write().await;
        if let Some(row) = Self::pending_row(&mut rows, project, id) {
            row.status = SplitStatus::Completed;
            row.contributor_tx = Some(contributor_tx);
            row.maintainer_tx = Some(maintainer_tx);
        }
    }

    pub async fn fail(
        &self,
        project: &str,
        id: u64,
        reason: String,
        contributor_tx: Option<TxId>,
    ) {
        let mut rows = self.rows.write().await;
        if let Some(row) = Self::pending_row(&mut rows, project, id) {
            row.status = SplitStatus::Failed;
            row.failure_reason = Some(reason);
            row.contributor_tx = contributor_tx;
        }
    }

    fn pending_row<'a>(
        rows: &'a mut HashMap<ProjectId, Vec<SplitPayment>>,
        project: &str,
        id: u64,
    ) -> Option<&'a mut SplitPayment> {
        rows.get_mut(project)?
            .iter_mut()
            .find(|r| r.id == id && r.status == SplitStatus::Pending)
    }

    pub async fn has_completed(&self, project: &str) -> bool {
        let rows = self.rows.read().await;
        rows.get(project)
            .map(|v| v.iter().any(|r| r.status == SplitStatus::Completed))
            .unwrap_or(false)
    }

    pub async fn latest(&self, project: &str) -> Option<SplitPayment> {
        let rows = self.rows.read().await;
        rows.get(project).and_then(|v| v.last().cloned())
    }

    /// Attach an external proof-of-payment hash to the latest non-failed
    /// attempt. Returns false when there is nothing to attach to.
    pub async fn attach_proof(&self, project: &str, transaction_hash: &str) -> bool {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows
            .get_mut(project)
            .and_then(|v| v.iter_mut().rev().find(|r| r.status != SplitStatus::Failed))
        {
            row.transaction_hash = Some(transaction_hash.to_string());
            true
        } else {
            false
        }
    }

    pub async fn list(&self, project: &str) -> Vec<SplitPayment> {
        let rows = self.rows.read().await;
        rows.get(project).cloned().unwrap_or_default()
    }
}

impl Default for SplitPaymentStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Moves funds from a hackathon's pool account into the project's
/// contributor and maintainer accounts once its result is approved.
#[derive(Clone)]
pub struct SettlementDispatcher {
    ledger: WalletLedger,
    catalog: Arc<dyn ProjectCatalog>,
    results: Arc<ResultStore>,
    splits: Arc<SplitPaymentStore>,
}

impl SettlementDispatcher {
    pub fn new(
        ledger: WalletLedger,
        catalog: Arc<dyn ProjectCatalog>,
        results: Arc<ResultStore>,
        splits: Arc<SplitPaymentStore>,
    ) -> Self {
        Self {
            ledger,
            catalog,
            results,
            splits,
        }
    }

    pub async fn settle(
        &self,
        hackathon: &str,
        project: &str,
    ) -> Result<SettlementOutcome, SettlementError> {
        // Holding the project lock for the whole flow keeps the result frozen
        // between the approval check and the fund movement, and serializes
        // concurrent settle calls for the same project.
        let _guard = self.results.lock_project(project).await;

        let result = self
            .results
            .get(hackathon, project)
            .await
            .ok_or(SettlementError::NoResult)?;

        if result.voting_status != VotingStatus::Approved {
            return Err(SettlementError::NotApproved);
        }

        if self.splits.has_completed(project).await {
            return Err(SettlementError::AlreadySettled);
        }

        let hack = self
            .catalog
            .hackathon(hackathon)
            .await
            .ok_or(SettlementError::UnknownHackathon)?;
        let meta = self
            .catalog
            .project(project)
            .await
            .ok_or(SettlementError::UnknownProject)?;

        // A prior failed attempt may have delivered the contributor leg
        // before the compensating credit; pick up from there rather than
        // paying it twice.
        let carried_contributor = self
            .splits
            .latest(project)
            .await
            .filter(|p| p.status == SplitStatus::Failed)
            .and_then(|p| p.contributor_tx);

        let total = result.total_funding;
        let contributor_share = result.contributor_share;
        let maintainer_share = result.maintainer_share;
        let due = if carried_contributor.is_some() {
            maintainer_share
        } else {
            total
        };

        let attempt = self
            .splits
            .open(project, total, contributor_share, maintainer_share)
            .await;
        let reference = format!("settle:{}", project);

        if let Err(e) = self
            .ledger
            .debit(&hack.pool_account, due, Some(reference.clone()))
            .await
        {
            // Nothing moved; InsufficientFunds surfaces unchanged.
            self.splits
                .fail(project, attempt, e.to_string(), carried_contributor)
                .await;
            return Err(e.into());
        }

        let contributor_tx = match carried_contributor {
            Some(tx) => tx,
            None => {
                match self
                    .ledger
                    .credit(&meta.contributor_account, contributor_share, Some(reference.clone()))
                    .await
                {
                    Ok(receipt) => receipt.tx_id,
                    Err(e) => {
                        // No leg delivered: the full debit goes back.
                        self.compensate(&hack.pool_account, due, project).await;
                        self.splits.fail(project, attempt, e.to_string(), None).await;
                        return Err(e.into());
                    }
                }
            }
        };

        let maintainer_tx = match self
            .ledger
            .credit(&meta.maintainer_account, maintainer_share, Some(reference))
            .await
        {
            Ok(receipt) => receipt.tx_id,
            Err(e) => {
                // The contributor leg landed; only the undelivered remainder
                // returns to the pool. The failed row records the delivered
                // leg so a re-attempt settles just the rest.
                self.compensate(&hack.pool_account, maintainer_share, project)
                    .await;
                self.splits
                    .fail(project, attempt, e.to_string(), Some(contributor_tx))
                    .await;
                return Err(e.into());
            }
        };

        self.splits
            .complete(project, attempt, contributor_tx, maintainer_tx)
            .await;

        Ok(SettlementOutcome {
            status: SplitStatus::Completed,
            contributor_tx,
            maintainer_tx,
        })
    }

    async fn compensate(&self, pool: &str, amount: Decimal, project: &str) {
        let reference = format!("compensate:{}", project);
        if let Err(e) = self.ledger.credit(pool, amount, Some(reference)).await {
            error!(
                project = %project,
                pool = %pool,
                error = ?e,
                "Compensating credit failed; pool balance is short"
            );
        }
    }
}
