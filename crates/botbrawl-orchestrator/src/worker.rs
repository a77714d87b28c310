//! Generation worker
//!
//! Drains the outbox: agent responses, judge verdicts and recaps. Battle
//! locks are only taken to read a snapshot or write the result, never
//! across a model call.

use std::sync::Arc;

use botbrawl_battle::{Battle, BattlePhase, StoredVerdict};
use botbrawl_judge::{moderate_or_pass, ContentModerator, JudgeInput, JudgePanel};
use botbrawl_llm::{CompletionRequest, SharedProvider};
use botbrawl_types::{BattleId, BrawlError, Result, Side};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::arena::Arena;
use crate::outbox::{GenerationJob, JobKind, JobStatus};

/// What one drain did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub completed: usize,
    /// Jobs whose battle had moved on; marked done without work
    pub skipped: usize,
    /// Failed attempts left pending for another try
    pub retried: usize,
    pub failed: usize,
}

enum JobOutcome {
    Completed,
    Skipped,
}

pub struct GenerationWorker {
    arena: Arc<Arena>,
    provider: SharedProvider,
    moderator: Arc<dyn ContentModerator>,
    panel: JudgePanel,
    max_attempts: u32,
}

impl GenerationWorker {
    pub fn new(arena: Arc<Arena>, provider: SharedProvider, moderator: Arc<dyn ContentModerator>) -> Self {
        let config = arena.config().clone();
        Self {
            panel: JudgePanel::new(provider.clone(), config.judge),
            max_attempts: config.scheduler.max_job_attempts,
            arena,
            provider,
            moderator,
        }
    }

    /// Run every pending job once
    ///
    /// Jobs are claimed before they run, so overlapping drains never run the
    /// same job or charge it two attempts.
    pub async fn drain(&self) -> WorkerReport {
        let mut report = WorkerReport::default();
        let mut touched = Vec::new();

        for queued in self.arena.outbox().pending() {
            let job = match self.arena.outbox().claim(queued.battle_id, queued.kind) {
                Some(job) => job,
                None => continue,
            };
            if !touched.contains(&job.battle_id) {
                touched.push(job.battle_id);
            }
            match self.run(&job).await {
                Ok(JobOutcome::Completed) => {
                    self.arena.outbox().mark_done(job.battle_id, job.kind);
                    report.completed += 1;
                }
                Ok(JobOutcome::Skipped) => {
                    self.arena.outbox().mark_done(job.battle_id, job.kind);
                    report.skipped += 1;
                }
                Err(err) => {
                    let status = self.arena.outbox().record_failure(
                        job.battle_id,
                        job.kind,
                        err.to_string(),
                        self.max_attempts,
                    );
                    warn!(
                        battle_id = %job.battle_id,
                        job_id = %job.id,
                        kind = ?job.kind,
                        attempt = job.attempts + 1,
                        error = %err,
                        "Generation job failed"
                    );
                    if status == JobStatus::Failed {
                        report.failed += 1;
                    } else {
                        report.retried += 1;
                    }
                }
            }
        }

        for battle_id in touched {
            self.forget_if_finished(&battle_id).await;
        }

        if report != WorkerReport::default() {
            info!(
                completed = report.completed,
                skipped = report.skipped,
                retried = report.retried,
                failed = report.failed,
                "Generation worker drained"
            );
        }
        report
    }

    /// Drop the jobs of a terminal battle once its work is over. A completed
    /// battle already holds its recap job, so nothing can be queued for it
    /// again.
    async fn forget_if_finished(&self, battle_id: &BattleId) {
        let terminal = match self.arena.battles().get(battle_id).await {
            Ok(battle) => battle.phase.is_terminal(),
            Err(_) => true,
        };
        if terminal {
            let removed = self.arena.outbox().forget_battle(battle_id);
            if removed > 0 {
                debug!(battle_id = %battle_id, removed, "Finished battle jobs released");
            }
        }
    }

    async fn run(&self, job: &GenerationJob) -> Result<JobOutcome> {
        let battle = self.arena.battles().get(&job.battle_id).await?;
        match job.kind {
            JobKind::Respond { side } => self.respond(&battle, side).await,
            JobKind::Judge => self.judge(&battle).await,
            JobKind::Recap => self.recap(&battle).await,
        }
    }

    async fn respond(&self, battle: &Battle, side: Side) -> Result<JobOutcome> {
        if battle.phase != BattlePhase::Responding || battle.responses.contains_key(&side) {
            return Ok(JobOutcome::Skipped);
        }
        let me = battle
            .participant(side)
            .ok_or_else(|| BrawlError::internal(format!("battle {} has no side {}", battle.id, side)))?;
        let opponents: Vec<&str> = battle
            .participants
            .iter()
            .filter(|p| p.side != side)
            .map(|p| p.display_name.as_str())
            .collect();

        let request = CompletionRequest::prompt(
            battle.kind.brief(),
            format!(
                "You are {}. Your opponent{}: {}. Write your entry now.",
                me.display_name,
                if opponents.len() > 1 { "s" } else { "" },
                opponents.join(" and ")
            ),
        );
        let reply = self.provider.complete(request).await?;

        // Underground runs unmoderated
        let text = if battle.underground {
            reply.content
        } else {
            moderate_or_pass(self.moderator.as_ref(), &reply.content).await.text
        };

        let stored = self.arena.battles().record_response(&battle.id, side, text).await?;
        debug!(battle_id = %battle.id, side = %side, stored, "Response generated");
        Ok(JobOutcome::Completed)
    }

    async fn judge(&self, battle: &Battle) -> Result<JobOutcome> {
        if battle.phase != BattlePhase::Judging || battle.verdict.is_some() {
            return Ok(JobOutcome::Skipped);
        }
        let response = |side: Side| battle.responses.get(&side).map(String::as_str).unwrap_or("");
        let verdict = self
            .panel
            .judge(JudgeInput {
                brief: battle.kind.brief(),
                response_a: response(Side::A),
                response_b: response(Side::B),
            })
            .await;

        let stored = StoredVerdict {
            average_a: verdict.average_a,
            average_b: verdict.average_b,
            winner: verdict.winner,
            reasoning: verdict
                .scorecards
                .iter()
                .map(|card| format!("{}: {}", card.judge, card.reasoning))
                .collect(),
            fallbacks: verdict.fallback_count(),
        };

        let handle = self.arena.battles().handle(&battle.id)?;
        let recorded = handle.lock().await.record_verdict(stored);
        info!(
            battle_id = %battle.id,
            average_a = verdict.average_a,
            average_b = verdict.average_b,
            winner = ?verdict.winner,
            recorded,
            "Judge verdict reached"
        );
        Ok(JobOutcome::Completed)
    }

    async fn recap(&self, battle: &Battle) -> Result<JobOutcome> {
        if battle.phase != BattlePhase::Completed || battle.recap.is_some() {
            return Ok(JobOutcome::Skipped);
        }
        let result = match battle.winning_side.and_then(|side| battle.participant(side)) {
            Some(winner) => format!("{} won.", winner.display_name),
            None => "It ended in a draw.".to_string(),
        };
        let entries: Vec<String> = battle
            .participants
            .iter()
            .filter_map(|p| {
                battle
                    .responses
                    .get(&p.side)
                    .map(|text| format!("{}: {}", p.display_name, text))
            })
            .collect();

        let request = CompletionRequest::prompt(
            "You are a ringside commentator. Recap the battle in two sentences.",
            format!("A {} battle.\n{}\n{}", battle.kind, entries.join("\n"), result),
        );
        let reply = self.provider.complete(request).await?;

        let handle = self.arena.battles().handle(&battle.id)?;
        let mut current = handle.lock().await;
        if current.recap.is_none() {
            current.recap = Some(reply.content);
        }
        Ok(JobOutcome::Completed)
    }
}
