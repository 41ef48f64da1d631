use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

pub type AccountId = String;
pub type ProjectId = String;
pub type VoterId = String;
pub type HackathonId = String;
pub type TxId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Credit,
    Debit,
}

/// Immutable ledger entry. Appended in the same actor step that moves the
/// balance, never mutated or deleted afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub account: AccountId,
    pub kind: TxKind,
    pub amount: Decimal,
    #[serde(with = "systemtime_serde")]
    pub at: SystemTime,
    #[serde(default)]
    pub reference: Option<String>,
}

impl Transaction {
    /// Credit counts positive, debit negative. An account balance is the
    /// running sum of these.
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TxKind::Credit => self.amount,
            TxKind::Debit => -self.amount,
        }
    }
}

/// Receipt returned by balance-changing ledger operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_id: TxId,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoterRole {
    Contributor,
    Maintainer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Support,
    Oppose,
}

/// One row per (project, voter). Revoting replaces the row in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub project: ProjectId,
    pub voter: VoterId,
    pub role: VoterRole,
    pub kind: VoteKind,
    #[serde(with = "systemtime_serde")]
    pub cast_at: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VotingStatus {
    Pending,
    Approved,
    Rejected,
}

/// Aggregated outcome for one project, keyed by (hackathon, project).
/// Recomputed in place on every aggregator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectResult {
    pub hackathon: HackathonId,
    pub project: ProjectId,
    pub final_rank: u32,
    pub total_votes: u64,
    pub yes_votes: u64,
    pub no_votes: u64,
    pub approval_percentage: Decimal,
    pub voting_status: VotingStatus,
    pub total_funding: Decimal,
    pub contributor_share: Decimal,
    pub maintainer_share: Decimal,
    #[serde(default)]
    pub award_category: Option<String>,
    pub metrics: serde_json::Value,
    #[serde(with = "systemtime_serde")]
    pub created_at: SystemTime,
    #[serde(with = "systemtime_serde")]
    pub updated_at: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStatus {
    Pending,
    Completed,
    Failed,
}

/// One row per settlement attempt. Status advances pending -> completed or
/// pending -> failed, never back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitPayment {
    pub id: u64,
    pub project: ProjectId,
    pub total_amount: Decimal,
    pub contributor_share: Decimal,
    pub maintainer_share: Decimal,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    pub status: SplitStatus,
    #[serde(default)]
    pub contributor_tx: Option<TxId>,
    #[serde(default)]
    pub maintainer_tx: Option<TxId>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(with = "systemtime_serde")]
    pub created_at: SystemTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementOutcome {
    pub status: SplitStatus,
    pub contributor_tx: TxId,
    pub maintainer_tx: TxId,
}

/// How an approved project's total_funding is determined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FundingPolicy {
    /// Every approved project receives the same fixed amount.
    FixedPerProject(Decimal),
    /// A single pool divided equally among approved projects at two decimal
    /// places; the rounding remainder goes to the rank-1 project so the pool
    /// is conserved exactly.
    SharedPool(Decimal),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HackathonMeta {
    pub id: HackathonId,
    pub pool_account: AccountId,
    pub funding: FundingPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub id: ProjectId,
    pub hackathon: HackathonId,
    pub contributor_account: AccountId,
    pub maintainer_account: AccountId,
    #[serde(with = "systemtime_serde")]
    pub created_at: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Create,
    Credit,
    Debit,
    Hackathon,
    Project,
    Vote,
    Compute,
    Settle,
}

/// One line of the CSV op protocol consumed by the CLI and server drivers.
/// Columns beyond `op` are optional; each op reads the ones it needs.
#[derive(Debug, Clone, Deserialize)]
pub struct OpRow {
    pub op: OpKind,
    #[serde(default)]
    pub hackathon: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub contributor: Option<String>,
    #[serde(default)]
    pub maintainer: Option<String>,
    #[serde(default)]
    pub voter: Option<String>,
    #[serde(default)]
    pub role: Option<VoterRole>,
    #[serde(default)]
    pub vote: Option<VoteKind>,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

pub mod systemtime_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time.duration_since(UNIX_EPOCH)
            .map_err(|_| serde::ser::Error::custom("SystemTime before Unix epoch"))?;
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_secs(secs))
    }
}
