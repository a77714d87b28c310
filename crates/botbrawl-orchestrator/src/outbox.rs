//! Generation outbox
//!
//! Ticks and requests never wait on a model. They append jobs here; the
//! [`crate::GenerationWorker`] runs them and writes results back to the
//! battle, where a later tick picks them up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use botbrawl_types::{BattleId, JobId, Side};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What a job generates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    /// The response of the agent on `side`
    Respond { side: Side },
    /// The judge panel verdict
    Judge,
    /// A short recap of a completed battle
    Recap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    /// Claimed by a worker drain
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: JobId,
    pub battle_id: BattleId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Job queue, one job per (battle, kind)
#[derive(Default)]
pub struct GenerationOutbox {
    jobs: Mutex<HashMap<(BattleId, JobKind), GenerationJob>>,
    enqueued: AtomicU64,
}

impl GenerationOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a job; returns false when one already exists for this battle
    /// and kind, whatever its status
    pub fn enqueue(&self, battle_id: BattleId, kind: JobKind) -> bool {
        let mut jobs = self.jobs.lock();
        if jobs.contains_key(&(battle_id, kind)) {
            return false;
        }
        let job = GenerationJob {
            id: JobId::new(),
            battle_id,
            kind,
            status: JobStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
        };
        debug!(battle_id = %battle_id, job_id = %job.id, kind = ?kind, "Generation job queued");
        jobs.insert((battle_id, kind), job);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Pending jobs, oldest first
    pub fn pending(&self) -> Vec<GenerationJob> {
        let mut pending: Vec<GenerationJob> = self
            .jobs
            .lock()
            .values()
            .filter(|job| job.status == JobStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|job| job.created_at);
        pending
    }

    /// Move a pending job to `Running`; `None` when another drain holds it
    /// or it already finished
    pub fn claim(&self, battle_id: BattleId, kind: JobKind) -> Option<GenerationJob> {
        let mut jobs = self.jobs.lock();
        let job = jobs.get_mut(&(battle_id, kind))?;
        if job.status != JobStatus::Pending {
            return None;
        }
        job.status = JobStatus::Running;
        Some(job.clone())
    }

    pub fn mark_done(&self, battle_id: BattleId, kind: JobKind) {
        if let Some(job) = self.jobs.lock().get_mut(&(battle_id, kind)) {
            job.status = JobStatus::Done;
        }
    }

    /// Count a failed attempt and release the claim; the job fails for good
    /// after `max_attempts`. Returns the resulting status.
    pub fn record_failure(&self, battle_id: BattleId, kind: JobKind, error: String, max_attempts: u32) -> JobStatus {
        let mut jobs = self.jobs.lock();
        match jobs.get_mut(&(battle_id, kind)) {
            Some(job) => {
                job.attempts += 1;
                job.last_error = Some(error);
                job.status = if job.attempts >= max_attempts {
                    JobStatus::Failed
                } else {
                    JobStatus::Pending
                };
                job.status
            }
            None => JobStatus::Failed,
        }
    }

    pub fn job(&self, battle_id: BattleId, kind: JobKind) -> Option<GenerationJob> {
        self.jobs.lock().get(&(battle_id, kind)).cloned()
    }

    pub fn jobs_for(&self, battle_id: &BattleId) -> Vec<GenerationJob> {
        self.jobs
            .lock()
            .values()
            .filter(|job| &job.battle_id == battle_id)
            .cloned()
            .collect()
    }

    /// Drop every job of a battle once none is pending or running; returns
    /// how many were removed
    ///
    /// Only call this for battles that can no longer enqueue work.
    pub fn forget_battle(&self, battle_id: &BattleId) -> usize {
        let mut jobs = self.jobs.lock();
        let busy = jobs
            .values()
            .any(|job| &job.battle_id == battle_id && matches!(job.status, JobStatus::Pending | JobStatus::Running));
        if busy {
            return 0;
        }
        let before = jobs.len();
        jobs.retain(|_, job| &job.battle_id != battle_id);
        before - jobs.len()
    }

    /// Jobs held right now, in any status
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Jobs ever queued
    pub fn enqueued_total(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }
}
