//! Battle launch and settlement
//!
//! The arena owns the stores a battle touches at its two ends: creation
//! (record, pool, response jobs) and settlement (winner, ratings, pool,
//! stats). Settlement and abort run on a battle already locked by the
//! caller, check the phase first and write the terminal phase last.

use std::sync::Arc;

use async_trait::async_trait;
use botbrawl_battle::{Battle, BattleBook, Participant, RatingChange, StatBook};
use botbrawl_betting::PoolManager;
use botbrawl_matchmaking::{AgentProfile, BattleLauncher};
use botbrawl_rating::{pairwise, scores_from_tally, three_way, Outcome};
use botbrawl_types::{ArenaKind, BattleId, BrawlConfig, BrawlError, Resolution, Result, Side};
use tracing::info;

use crate::outbox::{GenerationOutbox, JobKind};

pub struct Arena {
    battles: Arc<BattleBook>,
    pools: Arc<PoolManager>,
    stats: Arc<StatBook>,
    outbox: Arc<GenerationOutbox>,
    config: BrawlConfig,
}

impl Arena {
    pub fn new(pools: Arc<PoolManager>, config: BrawlConfig) -> Self {
        Self {
            battles: Arc::new(BattleBook::new()),
            stats: Arc::new(StatBook::new(config.rating.default_rating)),
            outbox: Arc::new(GenerationOutbox::new()),
            pools,
            config,
        }
    }

    pub fn battles(&self) -> &Arc<BattleBook> {
        &self.battles
    }

    pub fn pools(&self) -> &Arc<PoolManager> {
        &self.pools
    }

    pub fn stats(&self) -> &Arc<StatBook> {
        &self.stats
    }

    pub fn outbox(&self) -> &Arc<GenerationOutbox> {
        &self.outbox
    }

    pub fn config(&self) -> &BrawlConfig {
        &self.config
    }

    /// The side that won, as far as the battle's resolution rule says
    pub fn winning_side(battle: &Battle) -> Option<Side> {
        match battle.kind.resolution() {
            Resolution::Vote => battle.votes.leader(),
            Resolution::Judges => battle.verdict.as_ref().and_then(|v| v.winner),
            Resolution::GameResult => battle
                .chess
                .as_ref()
                .and_then(|game| game.result)
                .and_then(|result| result.winner()),
        }
    }

    /// Whether the optional vote quorum has been reached
    pub fn quorum_reached(&self, battle: &Battle) -> bool {
        self.config
            .battle
            .vote_quorum
            .map_or(false, |quorum| battle.votes.total() >= quorum)
    }

    fn rating_changes(&self, battle: &Battle, winning_side: Option<Side>) -> Vec<RatingChange> {
        let k = self.config.rating.k_factor;
        let ratings: Vec<i32> = battle
            .participants
            .iter()
            .map(|p| self.stats.rating(&p.agent_id, battle.kind))
            .collect();

        let deltas: Vec<i32> = match ratings.as_slice() {
            [a, b] => {
                let score_a = match winning_side {
                    Some(Side::A) => 1.0,
                    Some(_) => 0.0,
                    None => 0.5,
                };
                let (delta_a, delta_b) = pairwise(*a, *b, score_a, k);
                vec![delta_a, delta_b]
            }
            [a, b, c] => three_way([*a, *b, *c], scores_from_tally(battle.votes.tally()), k).to_vec(),
            _ => vec![0; ratings.len()],
        };

        battle
            .participants
            .iter()
            .zip(ratings.iter().zip(deltas))
            .map(|(p, (&before, delta))| RatingChange {
                agent_id: p.agent_id,
                side: p.side,
                before,
                after: before + delta,
                delta,
            })
            .collect()
    }

    fn outcome_for(battle: &Battle, side: Side, winning_side: Option<Side>) -> Outcome {
        match winning_side {
            Some(winner) if winner == side => Outcome::Win,
            Some(_) => Outcome::Loss,
            None if battle.kind.is_three_way() => {
                // Top-tied sides draw, the rest lost
                let top = battle.votes.counts().values().copied().max().unwrap_or(0);
                if battle.votes.count(side) == top {
                    Outcome::Draw
                } else {
                    Outcome::Loss
                }
            }
            None => Outcome::Draw,
        }
    }

    /// Settle a locked battle: winner, ratings, pool, stats, then the
    /// terminal phase. Returns false when the battle was already terminal.
    ///
    /// A pool settlement error leaves the battle untouched so a later tick
    /// retries the whole step.
    pub async fn settle(&self, battle: &mut Battle) -> Result<bool> {
        if battle.phase.is_terminal() {
            return Ok(false);
        }

        let winning_side = Self::winning_side(battle);
        let changes = self.rating_changes(battle, winning_side);

        if let Some(pool_id) = battle.pool_id {
            self.pools.settle(&pool_id, winning_side).await?;
        }

        for change in &changes {
            let outcome = Self::outcome_for(battle, change.side, winning_side);
            self.stats.apply(&change.agent_id, battle.kind, change.delta, outcome);
        }

        battle.complete(winning_side, changes)?;
        self.outbox.enqueue(battle.id, JobKind::Recap);

        info!(
            battle_id = %battle.id,
            kind = %battle.kind,
            winner = ?battle.winner,
            votes = battle.votes.total(),
            "Battle settled"
        );
        Ok(true)
    }

    /// Abort a locked battle, refunding its pool; no rating effect
    pub async fn abort(&self, battle: &mut Battle, reason: &str) -> Result<bool> {
        if battle.phase.is_terminal() {
            return Ok(false);
        }

        if let Some(pool_id) = battle.pool_id {
            self.pools.refund(&pool_id).await?;
        }
        battle.abort(reason)?;
        // Jobs still open are released by the worker once it skips them
        self.outbox.forget_battle(&battle.id);

        info!(battle_id = %battle.id, kind = %battle.kind, reason, "Battle aborted");
        Ok(true)
    }
}

#[async_trait]
impl BattleLauncher for Arena {
    async fn launch(&self, kind: ArenaKind, participants: Vec<AgentProfile>) -> Result<BattleId> {
        let sides = kind.sides();
        if participants.len() != sides.len() {
            return Err(BrawlError::internal(format!(
                "{} needs {} agents, got {}",
                kind,
                sides.len(),
                participants.len()
            )));
        }

        let participants = participants
            .into_iter()
            .zip(sides)
            .map(|(profile, side)| Participant {
                side: *side,
                agent_id: profile.agent_id,
                owner_id: profile.owner_id,
                display_name: profile.display_name,
            })
            .collect();

        let mut battle = Battle::new(kind, participants, self.config.battle.generation_timeout())?;
        if kind.supports_wagering() {
            let pool = self.pools.open_pool(battle.id, sides).await?;
            battle.pool_id = Some(pool.id);
        }

        let battle_id = self.battles.insert(battle);
        if kind.needs_responses() {
            for side in sides {
                self.outbox.enqueue(battle_id, JobKind::Respond { side: *side });
            }
        }
        Ok(battle_id)
    }
}
