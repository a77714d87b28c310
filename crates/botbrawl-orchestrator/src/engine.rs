//! The BotBrawl engine facade
//!
//! Wires the stores, matchmaker, orchestrator and worker together over the
//! injected collaborators, and exposes the operations callers (the HTTP
//! layer, the server loops, tests) use. Ownership checks live here.

use std::sync::Arc;

use botbrawl_battle::{Battle, ChessRules, LeaderboardEntry, NotationOnlyRules};
use botbrawl_betting::{BetPool, PoolManager, PoolOdds, StakeReceipt};
use botbrawl_judge::{ContentModerator, PassthroughModerator};
use botbrawl_ledger::{Balance, Ledger};
use botbrawl_llm::{ScriptedProvider, SharedProvider};
use botbrawl_matchmaking::{AgentDirectory, AgentProfile, EnqueueOutcome, Matchmaker, QueueEntry};
use botbrawl_types::{AgentId, ArenaKind, BattleId, BrawlConfig, BrawlError, EntryId, OwnerId, PoolId, Result, Side};
use tracing::info;

use crate::arena::Arena;
use crate::orchestrator::{Orchestrator, TickReport};
use crate::worker::{GenerationWorker, WorkerReport};

/// External services the engine talks to
#[derive(Clone)]
pub struct Collaborators {
    pub directory: Arc<dyn AgentDirectory>,
    pub provider: SharedProvider,
    pub moderator: Arc<dyn ContentModerator>,
    pub chess_rules: Arc<dyn ChessRules>,
}

impl Collaborators {
    /// Offline wiring: scripted completions, no moderation, notation-only
    /// chess
    pub fn offline(directory: Arc<dyn AgentDirectory>) -> Self {
        Self {
            directory,
            provider: Arc::new(ScriptedProvider::new("Bring it on.")),
            moderator: Arc::new(PassthroughModerator),
            chess_rules: Arc::new(NotationOnlyRules),
        }
    }

    pub fn with_provider(mut self, provider: SharedProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_moderator(mut self, moderator: Arc<dyn ContentModerator>) -> Self {
        self.moderator = moderator;
        self
    }

    pub fn with_chess_rules(mut self, chess_rules: Arc<dyn ChessRules>) -> Self {
        self.chess_rules = chess_rules;
        self
    }
}

pub struct BrawlEngine {
    config: BrawlConfig,
    ledger: Ledger,
    arena: Arc<Arena>,
    matchmaker: Arc<Matchmaker>,
    orchestrator: Orchestrator,
    worker: GenerationWorker,
    directory: Arc<dyn AgentDirectory>,
    chess_rules: Arc<dyn ChessRules>,
}

impl BrawlEngine {
    pub fn new(config: BrawlConfig, collaborators: Collaborators) -> Self {
        let ledger = Ledger::new();
        let pools = Arc::new(PoolManager::new(ledger.clone(), config.betting.clone()));
        let arena = Arc::new(Arena::new(pools, config.clone()));
        let matchmaker = Arc::new(Matchmaker::new(
            collaborators.directory.clone(),
            arena.clone(),
            config.matchmaking.clone(),
        ));

        info!(
            k_factor = config.rating.k_factor,
            rake_rate = %config.betting.rake_rate,
            voting_window_secs = config.battle.voting_window_secs,
            provider = collaborators.provider.name(),
            "BotBrawl engine ready"
        );

        Self {
            orchestrator: Orchestrator::new(arena.clone(), matchmaker.clone()),
            worker: GenerationWorker::new(arena.clone(), collaborators.provider, collaborators.moderator),
            directory: collaborators.directory,
            chess_rules: collaborators.chess_rules,
            config,
            ledger,
            arena,
            matchmaker,
        }
    }

    pub fn config(&self) -> &BrawlConfig {
        &self.config
    }

    pub fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// The agent, provided `owner_id` owns it
    async fn owned_agent(&self, owner_id: &OwnerId, agent_id: &AgentId) -> Result<AgentProfile> {
        let profile = self
            .directory
            .lookup(agent_id)
            .await
            .ok_or_else(|| BrawlError::not_found("Agent", agent_id))?;
        if &profile.owner_id != owner_id {
            return Err(BrawlError::Forbidden {
                reason: format!("agent {} belongs to another owner", agent_id),
            });
        }
        Ok(profile)
    }

    // ========================================================================
    // Matchmaking
    // ========================================================================

    pub async fn enqueue(
        &self,
        owner_id: &OwnerId,
        agent_id: AgentId,
        kind: ArenaKind,
        challenge_target: Option<AgentId>,
    ) -> Result<EnqueueOutcome> {
        self.owned_agent(owner_id, &agent_id).await?;
        Ok(self.matchmaker.enqueue(agent_id, kind, challenge_target).await?)
    }

    pub async fn queue_status(&self, owner_id: &OwnerId, agent_id: &AgentId) -> Result<Vec<QueueEntry>> {
        self.owned_agent(owner_id, agent_id).await?;
        Ok(self.matchmaker.status(agent_id).await)
    }

    pub async fn cancel(&self, owner_id: &OwnerId, agent_id: &AgentId, kind: Option<ArenaKind>) -> Result<usize> {
        self.owned_agent(owner_id, agent_id).await?;
        Ok(self.matchmaker.cancel(agent_id, kind).await)
    }

    // ========================================================================
    // Battles
    // ========================================================================

    pub async fn battle(&self, battle_id: &BattleId) -> Result<Battle> {
        Ok(self.arena.battles().get(battle_id).await?)
    }

    pub async fn cast_vote(&self, voter: OwnerId, battle_id: &BattleId, side: Side) -> Result<Battle> {
        Ok(self.arena.battles().cast_vote(battle_id, voter, side).await?)
    }

    pub async fn submit_move(
        &self,
        owner_id: &OwnerId,
        battle_id: &BattleId,
        agent_id: &AgentId,
        mv: &str,
    ) -> Result<Battle> {
        self.owned_agent(owner_id, agent_id).await?;
        let battle = self
            .arena
            .battles()
            .submit_move(
                battle_id,
                agent_id,
                mv,
                self.chess_rules.as_ref(),
                self.config.battle.generation_timeout(),
            )
            .await?;
        Ok(battle)
    }

    pub fn leaderboard(&self, kind: ArenaKind, limit: usize) -> Vec<LeaderboardEntry> {
        self.arena.stats().leaderboard(kind, limit)
    }

    // ========================================================================
    // Betting
    // ========================================================================

    pub async fn pool_for_battle(&self, battle_id: &BattleId) -> Result<BetPool> {
        Ok(self.arena.pools().pool_for_battle(battle_id).await?)
    }

    pub async fn pool_odds(&self, pool_id: &PoolId) -> Result<PoolOdds> {
        Ok(self.arena.pools().odds(pool_id).await?)
    }

    pub async fn place_stake(&self, bettor: &OwnerId, pool_id: &PoolId, side: Side, amount: u64) -> Result<StakeReceipt> {
        Ok(self.arena.pools().place_stake(pool_id, bettor, side, amount).await?)
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    pub async fn balance(&self, owner_id: &OwnerId) -> Balance {
        self.ledger.balance(owner_id).await
    }

    /// Faucet credit
    pub async fn deposit(&self, owner_id: &OwnerId, amount: u64) -> Result<Balance> {
        let reference = format!("deposit:{}", EntryId::new());
        Ok(self.ledger.deposit(owner_id, amount, &reference).await?)
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    pub async fn run_tick(&self) -> TickReport {
        self.orchestrator.run_tick().await
    }

    pub async fn run_worker(&self) -> WorkerReport {
        self.worker.drain().await
    }
}
