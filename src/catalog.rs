use crate::models::{HackathonId, HackathonMeta, ProjectId, ProjectMeta};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Read-only view of hackathon and project metadata. The catalog is owned by
/// an external collaborator; the aggregator and dispatcher only consume it.
#[async_trait]
pub trait ProjectCatalog: Send + Sync {
    async fn hackathon(&self, id: &str) -> Option<HackathonMeta>;
    /// Project ids entered under a hackathon, in registration order.
    async fn project_ids(&self, hackathon: &str) -> Vec<ProjectId>;
    async fn project(&self, id: &str) -> Option<ProjectMeta>;
}

pub struct InMemoryCatalog {
    hackathons: Arc<RwLock<HashMap<HackathonId, HackathonMeta>>>,
    listings: Arc<RwLock<HashMap<HackathonId, Vec<ProjectId>>>>,
    projects: Arc<RwLock<HashMap<ProjectId, ProjectMeta>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            hackathons: Arc::new(RwLock::new(HashMap::new())),
            listings: Arc::new(RwLock::new(HashMap::new())),
            projects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register_hackathon(&self, meta: HackathonMeta) {
        let mut hackathons = self.hackathons.write().await;
        hackathons.insert(meta.id.clone(), meta);
    }

    pub async fn register_project(&self, meta: ProjectMeta) {
        self.register_listing(&meta.hackathon, &meta.id).await;
        let mut projects = self.projects.write().await;
        projects.insert(meta.id.clone(), meta);
    }

    /// Enter a project id under a hackathon without detail metadata. The
    /// aggregator reports such projects as failed instead of aborting the
    /// run.
    pub async fn register_listing(&self, hackathon: &str, project: &str) {
        let mut listings = self.listings.write().await;
        let entries = listings.entry(hackathon.to_string()).or_default();
        if !entries.iter().any(|p| p == project) {
            entries.push(project.to_string());
        }
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectCatalog for InMemoryCatalog {
    async fn hackathon(&self, id: &str) -> Option<HackathonMeta> {
        let hackathons = self.hackathons.read().await;
        hackathons.get(id).cloned()
    }

    async fn project_ids(&self, hackathon: &str) -> Vec<ProjectId> {
        let listings = self.listings.read().await;
        listings.get(hackathon).cloned().unwrap_or_default()
    }

    async fn project(&self, id: &str) -> Option<ProjectMeta> {
        let projects = self.projects.read().await;
        projects.get(id).cloned()
    }
}
