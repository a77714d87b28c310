//! The scheduler tick
//!
//! A tick expires stale queue entries, drains the matchmaking queue into
//! battles, then walks every live battle and advances the ones whose state
//! or deadline calls for it. Ticks may overlap or repeat: each battle step
//! runs under the battle's own mutex and re-checks the phase first.

use std::sync::Arc;

use botbrawl_battle::{Battle, BattlePhase};
use botbrawl_matchmaking::Matchmaker;
use botbrawl_types::{BattleId, Resolution, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::arena::Arena;
use crate::outbox::{JobKind, JobStatus};

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub queue_expired: usize,
    pub matches_created: usize,
    /// Battles moved into voting or judging
    pub battles_advanced: usize,
    pub battles_settled: usize,
    pub battles_aborted: usize,
    pub jobs_dispatched: u64,
    pub errors: Vec<String>,
}

/// What happened to one battle during a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Unchanged,
    Advanced,
    Settled,
    Aborted,
}

pub struct Orchestrator {
    arena: Arc<Arena>,
    matchmaker: Arc<Matchmaker>,
}

impl Orchestrator {
    pub fn new(arena: Arc<Arena>, matchmaker: Arc<Matchmaker>) -> Self {
        Self { arena, matchmaker }
    }

    pub async fn run_tick(&self) -> TickReport {
        self.run_tick_at(Utc::now()).await
    }

    /// Run a tick as if the clock read `now`
    pub async fn run_tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let jobs_before = self.arena.outbox().enqueued_total();
        let mut report = TickReport {
            queue_expired: self.matchmaker.expire_stale_at(now).await,
            matches_created: self.matchmaker.drain_at(now).await.len(),
            ..TickReport::default()
        };

        for battle_id in self.arena.battles().live_ids().await {
            match self.advance(&battle_id, now).await {
                Ok(Step::Unchanged) => {}
                Ok(Step::Advanced) => report.battles_advanced += 1,
                Ok(Step::Settled) => report.battles_settled += 1,
                Ok(Step::Aborted) => report.battles_aborted += 1,
                Err(err) => {
                    warn!(battle_id = %battle_id, error = %err, "Battle step failed");
                    report.errors.push(format!("{}: {}", battle_id, err));
                }
            }
        }

        report.jobs_dispatched = self.arena.outbox().enqueued_total() - jobs_before;
        info!(
            queue_expired = report.queue_expired,
            matches_created = report.matches_created,
            battles_advanced = report.battles_advanced,
            battles_settled = report.battles_settled,
            battles_aborted = report.battles_aborted,
            jobs_dispatched = report.jobs_dispatched,
            errors = report.errors.len(),
            "Tick complete"
        );
        report
    }

    async fn advance(&self, battle_id: &BattleId, now: DateTime<Utc>) -> Result<Step> {
        let handle = self.arena.battles().handle(battle_id)?;
        let mut battle = handle.lock().await;

        match battle.phase {
            BattlePhase::Responding => self.advance_responding(&mut battle, now).await,
            BattlePhase::Voting => {
                if battle.is_past_deadline(now) || self.arena.quorum_reached(&battle) {
                    return self.settled(&mut battle).await;
                }
                Ok(Step::Unchanged)
            }
            BattlePhase::Judging => {
                if battle.verdict.is_some() {
                    return self.settled(&mut battle).await;
                }
                if battle.is_past_deadline(now) || self.job_failed(battle_id, JobKind::Judge) {
                    return self.aborted(&mut battle, "verdict never arrived").await;
                }
                Ok(Step::Unchanged)
            }
            BattlePhase::Completed | BattlePhase::Aborted => Ok(Step::Unchanged),
        }
    }

    async fn advance_responding(&self, battle: &mut Battle, now: DateTime<Utc>) -> Result<Step> {
        let config = &self.arena.config().battle;

        if battle.kind.resolution() == Resolution::GameResult {
            if battle.chess.as_ref().map_or(false, |game| game.is_finished()) {
                return self.settled(battle).await;
            }
            if battle.is_past_deadline(now) {
                return self.aborted(battle, "no move before the deadline").await;
            }
            return Ok(Step::Unchanged);
        }

        if battle.all_responses_in() {
            match battle.kind.resolution() {
                Resolution::Judges => {
                    battle.enter_judging(config.generation_timeout())?;
                    self.arena.outbox().enqueue(battle.id, JobKind::Judge);
                    info!(battle_id = %battle.id, "Battle sent to the judges");
                }
                _ => {
                    battle.enter_voting(config.voting_window())?;
                    info!(battle_id = %battle.id, deadline = %battle.deadline, "Voting opened");
                }
            }
            return Ok(Step::Advanced);
        }

        let generation_failed = battle
            .sides()
            .iter()
            .any(|side| self.job_failed(&battle.id, JobKind::Respond { side: *side }));
        if generation_failed {
            return self.aborted(battle, "response generation failed").await;
        }
        if battle.is_past_deadline(now) {
            return self.aborted(battle, "responses not generated in time").await;
        }

        debug!(battle_id = %battle.id, responses = battle.responses.len(), "Waiting for responses");
        Ok(Step::Unchanged)
    }

    fn job_failed(&self, battle_id: &BattleId, kind: JobKind) -> bool {
        self.arena
            .outbox()
            .job(*battle_id, kind)
            .map_or(false, |job| job.status == JobStatus::Failed)
    }

    async fn settled(&self, battle: &mut Battle) -> Result<Step> {
        Ok(if self.arena.settle(battle).await? {
            Step::Settled
        } else {
            Step::Unchanged
        })
    }

    async fn aborted(&self, battle: &mut Battle, reason: &str) -> Result<Step> {
        Ok(if self.arena.abort(battle, reason).await? {
            Step::Aborted
        } else {
            Step::Unchanged
        })
    }
}
