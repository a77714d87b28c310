//! The matchmaker service

use std::sync::Arc;

use async_trait::async_trait;
use botbrawl_types::{AgentId, ArenaKind, BattleId, BrawlError, MatchmakingConfig};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::directory::{AgentDirectory, AgentProfile};
use crate::queue::{select_opponents, EnqueueOutcome, QueueEntry, QueueStatus};
use crate::{MatchmakingError, Result};

/// Creates the battle (and its pool) for a freshly matched group
///
/// Participants arrive in queue order: the requester first, then the
/// opponents it was matched with.
#[async_trait]
pub trait BattleLauncher: Send + Sync {
    async fn launch(&self, kind: ArenaKind, participants: Vec<AgentProfile>) -> std::result::Result<BattleId, BrawlError>;
}

#[derive(Default)]
struct QueueState {
    /// Insertion order, so index order is age order
    entries: Vec<QueueEntry>,
}

impl QueueState {
    fn live_for_kind(&self, kind: ArenaKind, now: DateTime<Utc>) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.kind == kind && e.is_live(now))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Queue of agents awaiting opponents
///
/// A single async mutex guards the queue across opponent selection, battle
/// creation and the `matched` write, so an entry is consumed exactly once
/// even when enqueue requests and the orchestrator's drain race.
pub struct Matchmaker {
    queue: Mutex<QueueState>,
    directory: Arc<dyn AgentDirectory>,
    launcher: Arc<dyn BattleLauncher>,
    config: MatchmakingConfig,
}

impl Matchmaker {
    pub fn new(
        directory: Arc<dyn AgentDirectory>,
        launcher: Arc<dyn BattleLauncher>,
        config: MatchmakingConfig,
    ) -> Self {
        Self {
            queue: Mutex::new(QueueState::default()),
            directory,
            launcher,
            config,
        }
    }

    async fn active_profile(&self, agent_id: &AgentId) -> Result<AgentProfile> {
        let profile = self
            .directory
            .lookup(agent_id)
            .await
            .ok_or(MatchmakingError::AgentNotFound { agent_id: *agent_id })?;
        if !profile.active {
            return Err(MatchmakingError::AgentInactive { agent_id: *agent_id });
        }
        Ok(profile)
    }

    async fn validate_target(&self, agent_id: &AgentId, kind: ArenaKind, target: &AgentId) -> Result<()> {
        if target == agent_id {
            return Err(MatchmakingError::InvalidTarget {
                reason: "an agent cannot challenge itself".to_string(),
            });
        }
        if kind.is_three_way() {
            return Err(MatchmakingError::InvalidTarget {
                reason: format!("{} battles do not take challenges", kind),
            });
        }
        match self.directory.lookup(target).await {
            Some(profile) if profile.active => Ok(()),
            Some(_) => Err(MatchmakingError::InvalidTarget {
                reason: format!("agent {} is inactive", target),
            }),
            None => Err(MatchmakingError::InvalidTarget {
                reason: format!("agent {} does not exist", target),
            }),
        }
    }

    /// Queue an agent, matching it instantly when possible
    pub async fn enqueue(
        &self,
        agent_id: AgentId,
        kind: ArenaKind,
        challenge_target: Option<AgentId>,
    ) -> Result<EnqueueOutcome> {
        let requester = self.active_profile(&agent_id).await?;
        if let Some(target) = &challenge_target {
            self.validate_target(&agent_id, kind, target).await?;
        }

        let now = Utc::now();
        let mut queue = self.queue.lock().await;

        if queue
            .entries
            .iter()
            .any(|e| e.agent_id == agent_id && e.kind == kind && e.is_live(now))
        {
            return Err(MatchmakingError::AlreadyQueued { agent_id, kind });
        }

        let entry = QueueEntry::new(agent_id, kind, challenge_target, now, self.config.queue_ttl());
        let entry_id = entry.id;
        let expires_at = entry.expires_at;
        queue.entries.push(entry);
        let index = queue.entries.len() - 1;
        debug!(agent_id = %agent_id, kind = %kind, entry_id = %entry_id, "Agent queued");

        match self.try_match(&mut queue, index, requester, now).await {
            Some(battle_id) => Ok(EnqueueOutcome::Matched { battle_id, entry_id }),
            None => Ok(EnqueueOutcome::Waiting { entry_id, expires_at }),
        }
    }

    /// Try to build a group around the entry at `index` and launch it
    ///
    /// Opponents that turned inactive while waiting are cancelled. When the
    /// launch fails every entry stays waiting for a later drain.
    async fn try_match(
        &self,
        queue: &mut QueueState,
        index: usize,
        requester: AgentProfile,
        now: DateTime<Utc>,
    ) -> Option<BattleId> {
        let kind = queue.entries[index].kind;
        let needed = kind.parties() - 1;

        loop {
            let candidate_idx: Vec<usize> = queue
                .live_for_kind(kind, now)
                .into_iter()
                .filter(|&i| i != index)
                .collect();
            let candidates: Vec<&QueueEntry> = candidate_idx.iter().map(|&i| &queue.entries[i]).collect();
            let picked: Vec<usize> = select_opponents(&queue.entries[index], &candidates, needed)?
                .into_iter()
                .map(|p| candidate_idx[p])
                .collect();

            let mut profiles = vec![requester.clone()];
            let mut stale = None;
            for &i in &picked {
                let agent_id = queue.entries[i].agent_id;
                match self.directory.lookup(&agent_id).await {
                    Some(profile) if profile.active => profiles.push(profile),
                    _ => {
                        stale = Some(i);
                        break;
                    }
                }
            }
            if let Some(i) = stale {
                let entry = &mut queue.entries[i];
                entry.status = QueueStatus::Cancelled;
                info!(agent_id = %entry.agent_id, entry_id = %entry.id, "Dropped queue entry of inactive agent");
                continue;
            }

            return match self.launcher.launch(kind, profiles).await {
                Ok(battle_id) => {
                    for &i in picked.iter().chain(std::iter::once(&index)) {
                        let entry = &mut queue.entries[i];
                        entry.status = QueueStatus::Matched;
                        entry.battle_id = Some(battle_id);
                    }
                    info!(battle_id = %battle_id, kind = %kind, "Queue match launched");
                    Some(battle_id)
                }
                Err(err) => {
                    warn!(kind = %kind, error = %err, "Battle launch failed, entries stay queued");
                    None
                }
            };
        }
    }

    /// Cancel the agent's waiting entries (all kinds, or one); returns how
    /// many were cancelled
    pub async fn cancel(&self, agent_id: &AgentId, kind: Option<ArenaKind>) -> usize {
        let mut queue = self.queue.lock().await;
        let mut cancelled = 0;
        for entry in queue.entries.iter_mut() {
            if &entry.agent_id == agent_id
                && entry.status == QueueStatus::Waiting
                && kind.map_or(true, |k| k == entry.kind)
            {
                entry.status = QueueStatus::Cancelled;
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            info!(agent_id = %agent_id, cancelled, "Queue entries cancelled");
        }
        cancelled
    }

    /// The agent's entries, newest first
    pub async fn status(&self, agent_id: &AgentId) -> Vec<QueueEntry> {
        let queue = self.queue.lock().await;
        queue
            .entries
            .iter()
            .rev()
            .filter(|e| &e.agent_id == agent_id)
            .cloned()
            .collect()
    }

    /// Mark every waiting entry past its expiry as expired
    pub async fn expire_stale(&self) -> usize {
        self.expire_stale_at(Utc::now()).await
    }

    pub async fn expire_stale_at(&self, now: DateTime<Utc>) -> usize {
        let mut queue = self.queue.lock().await;
        let mut expired = 0;
        for entry in queue.entries.iter_mut() {
            if entry.status == QueueStatus::Waiting && now >= entry.expires_at {
                entry.status = QueueStatus::Expired;
                expired += 1;
            }
        }

        // Terminal entries are kept for one more TTL so status queries see them
        let horizon = now - self.config.queue_ttl();
        queue
            .entries
            .retain(|e| e.status == QueueStatus::Waiting || e.expires_at > horizon);

        if expired > 0 {
            info!(expired, "Queue entries expired");
        }
        expired
    }

    /// Pair any compatible waiting entries, oldest first, into battles
    pub async fn drain(&self) -> Vec<BattleId> {
        self.drain_at(Utc::now()).await
    }

    /// Drain as if the clock read `now`; entries past their TTL never match
    pub async fn drain_at(&self, now: DateTime<Utc>) -> Vec<BattleId> {
        let mut queue = self.queue.lock().await;
        let mut launched = Vec::new();

        for kind in ArenaKind::ALL {
            for index in queue.live_for_kind(kind, now) {
                if !queue.entries[index].is_live(now) {
                    continue;
                }
                let agent_id = queue.entries[index].agent_id;
                let requester = match self.directory.lookup(&agent_id).await {
                    Some(profile) if profile.active => profile,
                    _ => {
                        queue.entries[index].status = QueueStatus::Cancelled;
                        continue;
                    }
                };
                if let Some(battle_id) = self.try_match(&mut queue, index, requester, now).await {
                    launched.push(battle_id);
                }
            }
        }

        if !launched.is_empty() {
            info!(battles = launched.len(), "Matchmaking drain launched battles");
        }
        launched
    }

    /// Number of live waiting entries
    pub async fn waiting_count(&self) -> usize {
        let now = Utc::now();
        let queue = self.queue.lock().await;
        queue.entries.iter().filter(|e| e.is_live(now)).count()
    }
}
