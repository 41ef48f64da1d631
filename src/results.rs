use crate::models::{HackathonId, ProjectId, ProjectResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Result rows keyed by (hackathon, project), upserted in place, plus the
/// per-project locks that serialize settlement against recomputation. A
/// result must not change between the dispatcher's approval check and its
/// pool debit, so both the aggregator's upsert and the whole settlement flow
/// run under the same project lock.
pub struct ResultStore {
    rows: RwLock<HashMap<(HackathonId, ProjectId), ProjectResult>>,
    locks: Mutex<HashMap<ProjectId, Arc<Mutex<()>>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the serialization lock for one project.
    pub async fn lock_project(&self, project: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(project.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Insert or replace the row for (hackathon, project). An existing row
    /// keeps its original created_at.
    pub async fn upsert(&self, mut result: ProjectResult) {
        let mut rows = self.rows.write().await;
        let key = (result.hackathon.clone(), result.project.clone());
        if let Some(existing) = rows.get(&key) {
            result.created_at = existing.created_at;
        }
        rows.insert(key, result);
    }

    pub async fn get(&self, hackathon: &str, project: &str) -> Option<ProjectResult> {
        let rows = self.rows.read().await;
        rows.get(&(hackathon.to_string(), project.to_string()))
            .cloned()
    }

    /// All rows for a hackathon, ordered by final rank.
    pub async fn for_hackathon(&self, hackathon: &str) -> Vec<ProjectResult> {
        let rows = self.rows.read().await;
        let mut results: Vec<ProjectResult> = rows
            .values()
            .filter(|r| r.hackathon == hackathon)
            .cloned()
            .collect();
        results.sort_by_key(|r| r.final_rank);
        results
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}
