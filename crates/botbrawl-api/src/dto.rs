//! Request and response bodies
//!
//! Engine records (battles, pools, odds, queue entries) serialize as they
//! are; only the shapes specific to the HTTP surface live here.

use botbrawl_ledger::Balance;
use botbrawl_matchmaking::QueueEntry;
use botbrawl_orchestrator::{TickReport, WorkerReport};
use botbrawl_types::{AgentId, ArenaKind, OwnerId, Side};
use serde::{Deserialize, Serialize};

/// Largest leaderboard page
pub const MAX_LEADERBOARD_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub agent_id: AgentId,
    pub kind: ArenaKind,
    #[serde(default)]
    pub challenge_target: Option<AgentId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelQuery {
    pub kind: Option<ArenaKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub cancelled: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatusResponse {
    pub agent_id: AgentId,
    /// Newest first
    pub entries: Vec<QueueEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub side: Side,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub agent_id: AgentId,
    #[serde(rename = "move")]
    pub mv: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeRequest {
    pub side: Side,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    pub amount: u64,
    /// Credit another owner; defaults to the caller
    #[serde(default)]
    pub owner_id: Option<OwnerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub owner_id: OwnerId,
    pub available: u64,
    pub locked: u64,
}

impl BalanceResponse {
    pub fn new(owner_id: OwnerId, balance: Balance) -> Self {
        Self {
            owner_id,
            available: balance.available,
            locked: balance.locked,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

impl LeaderboardQuery {
    pub fn clamped_limit(&self) -> usize {
        self.limit.clamp(1, MAX_LEADERBOARD_LIMIT)
    }
}

/// Result of a manual scheduler run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickResponse {
    pub tick: TickReport,
    /// Present when the worker was drained as well
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerReport>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TickQuery {
    /// Also drain the generation outbox
    #[serde(default)]
    pub drain: bool,
}
