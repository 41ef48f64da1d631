use crate::catalog::ProjectCatalog;
use crate::config::EngineConfig;
use crate::errors::AggregationError;
use crate::models::{
    FundingPolicy, HackathonMeta, ProjectId, ProjectResult, VoteKind, VoterRole, VotingStatus,
};
use crate::results::ResultStore;
use crate::vote_store::VoteStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::warn;

/// Outcome of one aggregator run. Per-project failures are isolated here
/// instead of aborting the sibling projects.
#[derive(Debug)]
pub struct AggregationReport {
    pub updated: Vec<ProjectId>,
    pub failed: Vec<ProjectFailure>,
}

#[derive(Debug)]
pub struct ProjectFailure {
    pub project: ProjectId,
    pub error: AggregationError,
}

/// Per-project tally computed from one vote snapshot.
struct Tally {
    project: ProjectId,
    created_at: SystemTime,
    total_votes: u64,
    yes_votes: u64,
    no_votes: u64,
    approval_percentage: Decimal,
    contributor_votes: u64,
    maintainer_votes: u64,
}

/// Converts vote snapshots into ranked, funded Result rows. Recomputation is
/// idempotent: the same snapshot always produces the same fields, only
/// updated_at moves.
#[derive(Clone)]
pub struct ResultAggregator {
    config: EngineConfig,
    votes: VoteStore,
    catalog: Arc<dyn ProjectCatalog>,
    results: Arc<ResultStore>,
}

impl ResultAggregator {
    pub fn new(
        config: EngineConfig,
        votes: VoteStore,
        catalog: Arc<dyn ProjectCatalog>,
        results: Arc<ResultStore>,
    ) -> Self {
        Self {
            config,
            votes,
            catalog,
            results,
        }
    }

    pub async fn compute_results(
        &self,
        hackathon: &str,
    ) -> Result<AggregationReport, AggregationError> {
        let hack = self
            .catalog
            .hackathon(hackathon)
            .await
            .ok_or(AggregationError::UnknownHackathon)?;

        let project_ids = self.catalog.project_ids(hackathon).await;

        // Snapshot every project's votes up front so one run reflects a
        // single point in time even while new votes keep arriving.
        let mut snapshots = Vec::new();
        let mut failed = Vec::new();

        for project in &project_ids {
            match self.votes.snapshot(project).await {
                Ok(votes) => snapshots.push((project.clone(), votes)),
                Err(e) => {
                    warn!(project = %project, error = ?e, "Vote snapshot failed");
                    failed.push(ProjectFailure {
                        project: project.clone(),
                        error: AggregationError::VoteStore,
                    });
                }
            }
        }

        let mut tallies = Vec::new();

        for (project, votes) in snapshots {
            let Some(meta) = self.catalog.project(&project).await else {
                failed.push(ProjectFailure {
                    project,
                    error: AggregationError::MissingProjectMeta,
                });
                continue;
            };

            let total_votes = votes.len() as u64;
            let yes_votes = votes.iter().filter(|v| v.kind == VoteKind::Support).count() as u64;
            let no_votes = total_votes - yes_votes;
            let contributor_votes = votes
                .iter()
                .filter(|v| v.role == VoterRole::Contributor)
                .count() as u64;
            let maintainer_votes = total_votes - contributor_votes;

            let approval_percentage = if total_votes == 0 {
                Decimal::ZERO
            } else {
                (Decimal::from(yes_votes) * dec!(100) / Decimal::from(total_votes)).round_dp(2)
            };

            tallies.push(Tally {
                project,
                created_at: meta.created_at,
                total_votes,
                yes_votes,
                no_votes,
                approval_percentage,
                contributor_votes,
                maintainer_votes,
            });
        }

        // Deterministic ranking: approval desc, turnout desc, earliest
        // project first, then project id as the final tie-break.
        tallies.sort_by(|a, b| {
            b.approval_percentage
                .cmp(&a.approval_percentage)
                .then(b.total_votes.cmp(&a.total_votes))
                .then(a.created_at.cmp(&b.created_at))
                .then(a.project.cmp(&b.project))
        });

        let statuses: Vec<VotingStatus> = tallies.iter().map(|t| self.status_for(t)).collect();

        let funding = self.funding_amounts(&hack, &tallies, &statuses);

        let now = SystemTime::now();
        let mut updated = Vec::new();

        for (idx, tally) in tallies.iter().enumerate() {
            let status = statuses[idx];
            let total_funding = funding
                .get(&tally.project)
                .copied()
                .unwrap_or(Decimal::ZERO);
            let (contributor_share, maintainer_share) = if status == VotingStatus::Approved {
                self.config.shares(total_funding)
            } else {
                (Decimal::ZERO, Decimal::ZERO)
            };

            let row = ProjectResult {
                hackathon: hackathon.to_string(),
                project: tally.project.clone(),
                final_rank: (idx + 1) as u32,
                total_votes: tally.total_votes,
                yes_votes: tally.yes_votes,
                no_votes: tally.no_votes,
                approval_percentage: tally.approval_percentage,
                voting_status: status,
                total_funding,
                contributor_share,
                maintainer_share,
                award_category: award_for(&statuses, idx),
                metrics: json!({
                    "contributor_votes": tally.contributor_votes,
                    "maintainer_votes": tally.maintainer_votes,
                }),
                created_at: now,
                updated_at: now,
            };

            // The project lock keeps the upsert from racing a settlement in
            // flight for the same project.
            let _guard = self.results.lock_project(&tally.project).await;
            self.results.upsert(row).await;
            updated.push(tally.project.clone());
        }

        Ok(AggregationReport { updated, failed })
    }

    fn status_for(&self, tally: &Tally) -> VotingStatus {
        if tally.total_votes < self.config.quorum {
            return VotingStatus::Pending;
        }
        if tally.approval_percentage >= self.config.approval_threshold {
            VotingStatus::Approved
        } else {
            VotingStatus::Rejected
        }
    }

    /// Funding per approved project, according to the hackathon's policy.
    /// Projects that are not approved receive nothing.
    fn funding_amounts(
        &self,
        hack: &HackathonMeta,
        tallies: &[Tally],
        statuses: &[VotingStatus],
    ) -> HashMap<ProjectId, Decimal> {
        let approved: Vec<&Tally> = tallies
            .iter()
            .zip(statuses)
            .filter(|(_, s)| **s == VotingStatus::Approved)
            .map(|(t, _)| t)
            .collect();

        let mut amounts = HashMap::new();
        if approved.is_empty() {
            return amounts;
        }

        match &hack.funding {
            FundingPolicy::FixedPerProject(amount) => {
                for tally in approved {
                    amounts.insert(tally.project.clone(), *amount);
                }
            }
            FundingPolicy::SharedPool(pool) => {
                let n = Decimal::from(approved.len() as u64);
                let per_project = (*pool / n).round_dp(2);
                // Rounding remainder goes to the top-ranked project so the
                // pool divides without loss.
                let first_amount = *pool - per_project * (n - Decimal::ONE);
                for (i, tally) in approved.iter().enumerate() {
                    let amount = if i == 0 { first_amount } else { per_project };
                    amounts.insert(tally.project.clone(), amount);
                }
            }
        }

        amounts
    }
}

/// Award label by rank among approved projects only.
fn award_for(statuses: &[VotingStatus], idx: usize) -> Option<String> {
    if statuses[idx] != VotingStatus::Approved {
        return None;
    }
    let approved_rank = statuses[..=idx]
        .iter()
        .filter(|s| **s == VotingStatus::Approved)
        .count();
    match approved_rank {
        1 => Some("winner".to_string()),
        2 => Some("runner-up".to_string()),
        3 => Some("finalist".to_string()),
        _ => None,
    }
}
