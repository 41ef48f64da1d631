use crate::models::{ProjectId, Vote, VoteKind, VoterId, VoterRole};
use anyhow::Result;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::SystemTime;
use tokio::sync::{mpsc, oneshot};

pub enum VoteMessage {
    Cast {
        project: ProjectId,
        voter: VoterId,
        role: VoterRole,
        kind: VoteKind,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        project: ProjectId,
        reply: oneshot::Sender<Vec<Vote>>,
    },
}

/// Actor owning the ballots for a shard of projects. A project's votes all
/// live in one actor, so concurrent revotes by the same voter serialize to a
/// single winner by arrival order, and a snapshot is atomic per project.
pub struct VoteActor {
    ballots: HashMap<ProjectId, HashMap<VoterId, Vote>>,
    receiver: mpsc::Receiver<VoteMessage>,
}

impl VoteActor {
    pub fn new(receiver: mpsc::Receiver<VoteMessage>) -> Self {
        Self {
            ballots: HashMap::new(),
            receiver,
        }
    }

    pub async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                VoteMessage::Cast {
                    project,
                    voter,
                    role,
                    kind,
                    reply,
                } => {
                    let vote = Vote {
                        project: project.clone(),
                        voter: voter.clone(),
                        role,
                        kind,
                        // Stamped at arrival, not by the caller's clock
                        cast_at: SystemTime::now(),
                    };
                    self.ballots.entry(project).or_default().insert(voter, vote);
                    let _ = reply.send(());
                }
                VoteMessage::Snapshot { project, reply } => {
                    let mut votes: Vec<Vote> = self
                        .ballots
                        .get(&project)
                        .map(|b| b.values().cloned().collect())
                        .unwrap_or_default();
                    votes.sort_by(|a, b| a.voter.cmp(&b.voter));
                    let _ = reply.send(votes);
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct VoteHandle {
    sender: mpsc::Sender<VoteMessage>,
}

impl VoteHandle {
    pub fn new(sender: mpsc::Sender<VoteMessage>) -> Self {
        Self { sender }
    }

    pub async fn cast(
        &self,
        project: &str,
        voter: &str,
        role: VoterRole,
        kind: VoteKind,
    ) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.sender
            .send(VoteMessage::Cast {
                project: project.to_string(),
                voter: voter.to_string(),
                role,
                kind,
                reply: reply_tx,
            })
            .await?;

        Ok(reply_rx.await?)
    }

    pub async fn snapshot(&self, project: &str) -> Result<Vec<Vote>> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.sender
            .send(VoteMessage::Snapshot {
                project: project.to_string(),
                reply: reply_tx,
            })
            .await?;

        Ok(reply_rx.await?)
    }
}

/// Sharded vote store; projects route to actors by id hash.
#[derive(Clone)]
pub struct VoteStore {
    shards: Vec<VoteHandle>,
}

impl VoteStore {
    pub fn new(num_shards: usize) -> Self {
        let mut shards = Vec::new();

        for _ in 0..num_shards {
            let (tx, rx) = mpsc::channel(10_000);
            let handle = VoteHandle::new(tx);
            let actor = VoteActor::new(rx);

            tokio::spawn(async move {
                actor.run().await;
            });

            shards.push(handle);
        }

        Self { shards }
    }

    fn shard_for(&self, project: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        project.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    /// Upsert the (project, voter) vote. Revoting replaces the prior row;
    /// there is never more than one active vote per voter per project.
    pub async fn cast_vote(
        &self,
        project: &str,
        voter: &str,
        role: VoterRole,
        kind: VoteKind,
    ) -> Result<()> {
        self.shards[self.shard_for(project)]
            .cast(project, voter, role, kind)
            .await
    }

    /// Atomic snapshot of a project's current votes.
    pub async fn snapshot(&self, project: &str) -> Result<Vec<Vote>> {
        self.shards[self.shard_for(project)].snapshot(project).await
    }
}
