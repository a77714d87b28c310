//! BotBrawl Matchmaking - Pairing agents into battles
//!
//! An enqueue request either resolves instantly against a compatible waiting
//! entry (the battle exists before the request returns) or parks the agent
//! in the queue until another request or the orchestrator's drain finds it a
//! match. Waiting entries expire after the configured TTL (one hour by
//! default).
//!
//! Compatibility: same arena kind, different agents, and every entry accepts
//! every other member of the group. An entry with a challenge target accepts
//! only that agent.

mod directory;
mod matchmaker;
mod queue;

pub use directory::{AgentDirectory, AgentProfile, InMemoryAgentDirectory};
pub use matchmaker::{BattleLauncher, Matchmaker};
pub use queue::{select_opponents, EnqueueOutcome, QueueEntry, QueueStatus};

use botbrawl_types::{AgentId, ArenaKind, BrawlError};
use thiserror::Error;

/// Errors from queue operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchmakingError {
    #[error("Agent not found: {agent_id}")]
    AgentNotFound { agent_id: AgentId },

    #[error("Agent {agent_id} is inactive")]
    AgentInactive { agent_id: AgentId },

    #[error("Agent {agent_id} is already queued for {kind}")]
    AlreadyQueued { agent_id: AgentId, kind: ArenaKind },

    #[error("Invalid challenge target: {reason}")]
    InvalidTarget { reason: String },
}

pub type Result<T> = std::result::Result<T, MatchmakingError>;

impl From<MatchmakingError> for BrawlError {
    fn from(err: MatchmakingError) -> Self {
        match err {
            MatchmakingError::AgentNotFound { agent_id } => BrawlError::not_found("Agent", agent_id),
            MatchmakingError::AgentInactive { agent_id } => BrawlError::AgentInactive {
                agent_id: agent_id.to_string(),
            },
            MatchmakingError::AlreadyQueued { agent_id, kind } => BrawlError::AlreadyQueued {
                agent_id: agent_id.to_string(),
                kind: kind.to_string(),
            },
            MatchmakingError::InvalidTarget { reason } => BrawlError::InvalidTarget { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use botbrawl_types::{BattleId, MatchmakingConfig, OwnerId};
    use chrono::{Duration, Utc};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingLauncher {
        launches: Mutex<Vec<(ArenaKind, Vec<AgentId>, BattleId)>>,
        fail: AtomicBool,
    }

    impl RecordingLauncher {
        fn count(&self) -> usize {
            self.launches.lock().len()
        }
    }

    #[async_trait]
    impl BattleLauncher for RecordingLauncher {
        async fn launch(
            &self,
            kind: ArenaKind,
            participants: Vec<AgentProfile>,
        ) -> std::result::Result<BattleId, BrawlError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(BrawlError::internal("launch refused"));
            }
            let battle_id = BattleId::new();
            let agents = participants.iter().map(|p| p.agent_id).collect();
            self.launches.lock().push((kind, agents, battle_id));
            Ok(battle_id)
        }
    }

    struct Fixture {
        directory: Arc<InMemoryAgentDirectory>,
        launcher: Arc<RecordingLauncher>,
        matchmaker: Arc<Matchmaker>,
    }

    fn fixture() -> Fixture {
        let directory = Arc::new(InMemoryAgentDirectory::new());
        let launcher = Arc::new(RecordingLauncher::default());
        let matchmaker = Arc::new(Matchmaker::new(
            directory.clone(),
            launcher.clone(),
            MatchmakingConfig::default(),
        ));
        Fixture {
            directory,
            launcher,
            matchmaker,
        }
    }

    impl Fixture {
        fn agent(&self, name: &str) -> AgentId {
            self.directory.register(OwnerId::new(), name).agent_id
        }
    }

    #[tokio::test]
    async fn test_second_enqueue_matches_synchronously() {
        let f = fixture();
        let y = f.agent("Y");
        let x = f.agent("X");

        let waiting = f.matchmaker.enqueue(y, ArenaKind::Roast, None).await.unwrap();
        assert!(matches!(waiting, EnqueueOutcome::Waiting { .. }));

        let matched = f.matchmaker.enqueue(x, ArenaKind::Roast, None).await.unwrap();
        let battle_id = match matched {
            EnqueueOutcome::Matched { battle_id, .. } => battle_id,
            other => panic!("expected a match, got {:?}", other),
        };

        // The battle exists before enqueue returned
        let launches = f.launcher.launches.lock().clone();
        assert_eq!(launches.len(), 1);
        assert_eq!(launches[0].1, vec![x, y]);
        assert_eq!(launches[0].2, battle_id);

        for agent in [x, y] {
            let entries = f.matchmaker.status(&agent).await;
            assert_eq!(entries[0].status, QueueStatus::Matched);
            assert_eq!(entries[0].battle_id, Some(battle_id));
        }
    }

    #[tokio::test]
    async fn test_kinds_do_not_mix() {
        let f = fixture();
        let a = f.agent("a");
        let b = f.agent("b");
        f.matchmaker.enqueue(a, ArenaKind::Roast, None).await.unwrap();
        let outcome = f.matchmaker.enqueue(b, ArenaKind::Debate, None).await.unwrap();
        assert!(matches!(outcome, EnqueueOutcome::Waiting { .. }));
        assert_eq!(f.launcher.count(), 0);
    }

    #[tokio::test]
    async fn test_already_queued() {
        let f = fixture();
        let a = f.agent("a");
        f.matchmaker.enqueue(a, ArenaKind::Roast, None).await.unwrap();
        let result = f.matchmaker.enqueue(a, ArenaKind::Roast, None).await;
        assert_eq!(
            result,
            Err(MatchmakingError::AlreadyQueued {
                agent_id: a,
                kind: ArenaKind::Roast
            })
        );

        // Another kind is fine
        assert!(f.matchmaker.enqueue(a, ArenaKind::Debate, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_targets() {
        let f = fixture();
        let a = f.agent("a");
        let sleeping = f.agent("sleeping");
        f.directory.set_active(&sleeping, false);

        for target in [a, sleeping, AgentId::new()] {
            let result = f.matchmaker.enqueue(a, ArenaKind::Roast, Some(target)).await;
            assert!(matches!(result, Err(MatchmakingError::InvalidTarget { .. })));
        }

        let b = f.agent("b");
        let result = f.matchmaker.enqueue(a, ArenaKind::Royale, Some(b)).await;
        assert!(matches!(result, Err(MatchmakingError::InvalidTarget { .. })));
    }

    #[tokio::test]
    async fn test_inactive_requester_rejected() {
        let f = fixture();
        let a = f.agent("a");
        f.directory.set_active(&a, false);
        let result = f.matchmaker.enqueue(a, ArenaKind::Roast, None).await;
        assert_eq!(result, Err(MatchmakingError::AgentInactive { agent_id: a }));

        let result = f.matchmaker.enqueue(AgentId::new(), ArenaKind::Roast, None).await;
        assert!(matches!(result, Err(MatchmakingError::AgentNotFound { .. })));
    }

    #[tokio::test]
    async fn test_challenge_waits_for_target() {
        let f = fixture();
        let challenger = f.agent("challenger");
        let target = f.agent("target");
        let bystander = f.agent("bystander");

        f.matchmaker
            .enqueue(challenger, ArenaKind::Debate, Some(target))
            .await
            .unwrap();
        let outcome = f.matchmaker.enqueue(bystander, ArenaKind::Debate, None).await.unwrap();
        assert!(matches!(outcome, EnqueueOutcome::Waiting { .. }));

        let outcome = f.matchmaker.enqueue(target, ArenaKind::Debate, None).await.unwrap();
        assert!(matches!(outcome, EnqueueOutcome::Matched { .. }));
        let launches = f.launcher.launches.lock().clone();
        assert_eq!(launches[0].1, vec![target, challenger]);
    }

    #[tokio::test]
    async fn test_royale_needs_three() {
        let f = fixture();
        let agents: Vec<AgentId> = (0..3).map(|i| f.agent(&format!("r{}", i))).collect();

        for agent in &agents[..2] {
            let outcome = f.matchmaker.enqueue(*agent, ArenaKind::Royale, None).await.unwrap();
            assert!(matches!(outcome, EnqueueOutcome::Waiting { .. }));
        }
        let outcome = f.matchmaker.enqueue(agents[2], ArenaKind::Royale, None).await.unwrap();
        assert!(matches!(outcome, EnqueueOutcome::Matched { .. }));
        assert_eq!(f.launcher.launches.lock()[0].1.len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_and_status() {
        let f = fixture();
        let a = f.agent("a");
        f.matchmaker.enqueue(a, ArenaKind::Roast, None).await.unwrap();
        f.matchmaker.enqueue(a, ArenaKind::HotTake, None).await.unwrap();

        assert_eq!(f.matchmaker.cancel(&a, Some(ArenaKind::Roast)).await, 1);
        assert_eq!(f.matchmaker.cancel(&a, None).await, 1);
        assert_eq!(f.matchmaker.cancel(&a, None).await, 0);

        let entries = f.matchmaker.status(&a).await;
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.status == QueueStatus::Cancelled));
        assert_eq!(entries[0].kind, ArenaKind::HotTake);
    }

    #[tokio::test]
    async fn test_expiry_sweep() {
        let f = fixture();
        let a = f.agent("a");
        f.matchmaker.enqueue(a, ArenaKind::Roast, None).await.unwrap();

        assert_eq!(f.matchmaker.expire_stale().await, 0);
        let later = Utc::now() + Duration::minutes(61);
        assert_eq!(f.matchmaker.expire_stale_at(later).await, 1);
        assert_eq!(f.matchmaker.expire_stale_at(later).await, 0);

        let entries = f.matchmaker.status(&a).await;
        assert_eq!(entries[0].status, QueueStatus::Expired);
    }

    #[tokio::test]
    async fn test_failed_launch_keeps_entries_for_drain() {
        let f = fixture();
        let a = f.agent("a");
        let b = f.agent("b");
        f.launcher.fail.store(true, Ordering::SeqCst);

        f.matchmaker.enqueue(a, ArenaKind::Roast, None).await.unwrap();
        let outcome = f.matchmaker.enqueue(b, ArenaKind::Roast, None).await.unwrap();
        assert!(matches!(outcome, EnqueueOutcome::Waiting { .. }));
        assert_eq!(f.matchmaker.waiting_count().await, 2);

        f.launcher.fail.store(false, Ordering::SeqCst);
        let launched = f.matchmaker.drain().await;
        assert_eq!(launched.len(), 1);
        assert_eq!(f.matchmaker.waiting_count().await, 0);
        assert!(f.matchmaker.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_drain_uses_the_given_clock() {
        let f = fixture();
        let a = f.agent("a");
        let b = f.agent("b");
        f.launcher.fail.store(true, Ordering::SeqCst);
        f.matchmaker.enqueue(a, ArenaKind::Roast, None).await.unwrap();
        f.matchmaker.enqueue(b, ArenaKind::Roast, None).await.unwrap();
        f.launcher.fail.store(false, Ordering::SeqCst);

        // Both entries are past their TTL at this instant
        let later = Utc::now() + Duration::minutes(61);
        assert!(f.matchmaker.drain_at(later).await.is_empty());
        assert_eq!(f.launcher.count(), 0);

        assert_eq!(f.matchmaker.drain_at(Utc::now()).await.len(), 1);
    }

    #[tokio::test]
    async fn test_deactivated_opponent_is_dropped() {
        let f = fixture();
        let a = f.agent("a");
        let b = f.agent("b");
        let c = f.agent("c");
        f.matchmaker.enqueue(a, ArenaKind::Roast, None).await.unwrap();
        f.directory.set_active(&a, false);

        f.matchmaker.enqueue(b, ArenaKind::Roast, None).await.unwrap();
        assert_eq!(f.launcher.count(), 0);
        assert_eq!(f.matchmaker.status(&a).await[0].status, QueueStatus::Cancelled);

        let outcome = f.matchmaker.enqueue(c, ArenaKind::Roast, None).await.unwrap();
        assert!(matches!(outcome, EnqueueOutcome::Matched { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_enqueues_consume_each_entry_once() {
        let f = fixture();
        let agents: Vec<AgentId> = (0..10).map(|i| f.agent(&format!("bot{}", i))).collect();

        let tasks = agents.iter().map(|agent| {
            let matchmaker = f.matchmaker.clone();
            let agent = *agent;
            async move { matchmaker.enqueue(agent, ArenaKind::Roast, None).await }
        });
        let results = futures::future::join_all(tasks).await;
        assert!(results.iter().all(|r| r.is_ok()));

        let launches = f.launcher.launches.lock().clone();
        assert_eq!(launches.len(), 5);
        let mut seen: Vec<AgentId> = launches.iter().flat_map(|l| l.1.clone()).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 10);
    }
}
