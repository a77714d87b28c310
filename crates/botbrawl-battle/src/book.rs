//! In-memory battle store
//!
//! Each battle sits behind its own async mutex. Requests (votes, moves,
//! responses) and the orchestrator's settlement all take that mutex, so a
//! settlement sees a stable record and writes the terminal phase last.

use std::collections::HashMap;
use std::sync::Arc;

use botbrawl_types::{AgentId, BattleId, OwnerId, Side};
use chrono::Duration;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::battle::{Battle, BattlePhase};
use crate::chess::ChessRules;
use crate::{BattleError, Result};

/// Shared handle to one battle
pub type BattleHandle = Arc<Mutex<Battle>>;

#[derive(Default)]
pub struct BattleBook {
    battles: RwLock<HashMap<BattleId, BattleHandle>>,
}

impl BattleBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, battle: Battle) -> BattleId {
        let id = battle.id;
        info!(
            battle_id = %id,
            kind = %battle.kind,
            agents = ?battle.agent_ids(),
            "Battle created"
        );
        self.battles.write().insert(id, Arc::new(Mutex::new(battle)));
        id
    }

    pub fn handle(&self, battle_id: &BattleId) -> Result<BattleHandle> {
        self.battles
            .read()
            .get(battle_id)
            .cloned()
            .ok_or(BattleError::NotFound { battle_id: *battle_id })
    }

    /// Snapshot of a battle
    pub async fn get(&self, battle_id: &BattleId) -> Result<Battle> {
        let handle = self.handle(battle_id)?;
        let battle = handle.lock().await;
        Ok(battle.clone())
    }

    pub fn len(&self) -> usize {
        self.battles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.battles.read().is_empty()
    }

    pub fn ids(&self) -> Vec<BattleId> {
        self.battles.read().keys().copied().collect()
    }

    /// Battles that have not reached a terminal phase
    pub async fn live_ids(&self) -> Vec<BattleId> {
        let handles: Vec<(BattleId, BattleHandle)> = self
            .battles
            .read()
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect();

        let mut live = Vec::new();
        for (id, handle) in handles {
            if !handle.lock().await.phase.is_terminal() {
                live.push(id);
            }
        }
        live
    }

    pub async fn cast_vote(&self, battle_id: &BattleId, voter: OwnerId, side: Side) -> Result<Battle> {
        let handle = self.handle(battle_id)?;
        let mut battle = handle.lock().await;
        battle.cast_vote(voter, side)?;
        debug!(battle_id = %battle_id, side = %side, total = battle.votes.total(), "Vote cast");
        Ok(battle.clone())
    }

    /// Store a response; returns false when one was already stored
    pub async fn record_response(&self, battle_id: &BattleId, side: Side, text: String) -> Result<bool> {
        let handle = self.handle(battle_id)?;
        let mut battle = handle.lock().await;
        battle.record_response(side, text)
    }

    /// Play a chess move for `agent_id`
    ///
    /// The inactivity deadline is pushed back by `move_timeout` after every
    /// accepted move.
    pub async fn submit_move(
        &self,
        battle_id: &BattleId,
        agent_id: &AgentId,
        mv: &str,
        rules: &dyn ChessRules,
        move_timeout: Duration,
    ) -> Result<Battle> {
        let handle = self.handle(battle_id)?;
        let mut battle = handle.lock().await;

        if battle.phase != BattlePhase::Responding {
            return Err(BattleError::BattleClosed {
                battle_id: *battle_id,
                phase: battle.phase,
            });
        }
        let side = battle
            .side_of(agent_id)
            .ok_or(BattleError::NotAParticipant { agent_id: *agent_id })?;
        let game = battle
            .chess
            .as_ref()
            .ok_or(BattleError::NotAChessBattle { battle_id: *battle_id })?;
        if game.is_finished() {
            return Err(BattleError::BattleClosed {
                battle_id: *battle_id,
                phase: battle.phase,
            });
        }
        if game.to_move != side {
            return Err(BattleError::NotYourTurn { agent_id: *agent_id });
        }

        let outcome = rules
            .apply(&game.position, side, mv)
            .await
            .map_err(|reason| BattleError::IllegalMove {
                mv: mv.to_string(),
                reason,
            })?;

        let finished = outcome.result;
        if let Some(game) = battle.chess.as_mut() {
            game.record(*agent_id, mv, outcome);
        }
        battle.deadline = chrono::Utc::now() + move_timeout;

        debug!(battle_id = %battle_id, side = %side, mv, "Chess move played");
        if let Some(result) = finished {
            info!(battle_id = %battle_id, result = ?result, "Chess game finished");
        }
        Ok(battle.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::Participant;
    use crate::chess::{GameResult, NotationOnlyRules};
    use botbrawl_types::ArenaKind;

    fn new_battle(kind: ArenaKind) -> Battle {
        let participants = kind
            .sides()
            .iter()
            .map(|side| Participant {
                side: *side,
                agent_id: AgentId::new(),
                owner_id: OwnerId::new(),
                display_name: format!("bot-{}", side),
            })
            .collect();
        Battle::new(kind, participants, Duration::minutes(10)).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let book = BattleBook::new();
        let id = book.insert(new_battle(ArenaKind::Roast));
        let battle = book.get(&id).await.unwrap();
        assert_eq!(battle.kind, ArenaKind::Roast);
        assert_eq!(book.live_ids().await, vec![id]);

        assert!(matches!(
            book.get(&BattleId::new()).await,
            Err(BattleError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_live_ids_skip_terminal() {
        let book = BattleBook::new();
        let id = book.insert(new_battle(ArenaKind::Roast));
        book.handle(&id).unwrap().lock().await.abort("test").unwrap();
        assert!(book.live_ids().await.is_empty());
        assert_eq!(book.len(), 1);
    }

    #[tokio::test]
    async fn test_vote_through_book() {
        let book = BattleBook::new();
        let id = book.insert(new_battle(ArenaKind::Debate));
        let voter = OwnerId::new();
        let battle = book.cast_vote(&id, voter, Side::B).await.unwrap();
        assert_eq!(battle.votes.count(Side::B), 1);
        assert!(book.cast_vote(&id, voter, Side::B).await.is_err());
    }

    #[tokio::test]
    async fn test_chess_turns() {
        let book = BattleBook::new();
        let battle = new_battle(ArenaKind::Chess);
        let white = battle.participants[0].agent_id;
        let black = battle.participants[1].agent_id;
        let id = book.insert(battle);
        let rules = NotationOnlyRules;
        let timeout = Duration::minutes(10);

        let result = book.submit_move(&id, &black, "e7e5", &rules, timeout).await;
        assert!(matches!(result, Err(BattleError::NotYourTurn { .. })));

        book.submit_move(&id, &white, "e2e4", &rules, timeout).await.unwrap();

        let result = book.submit_move(&id, &black, "zz", &rules, timeout).await;
        assert!(matches!(result, Err(BattleError::IllegalMove { .. })));

        let battle = book.submit_move(&id, &black, "resign", &rules, timeout).await.unwrap();
        let game = battle.chess.unwrap();
        assert_eq!(game.moves.len(), 2);
        assert_eq!(game.result, Some(GameResult::Decisive { winner: Side::A }));

        // Finished games take no more moves
        let result = book.submit_move(&id, &white, "d2d4", &rules, timeout).await;
        assert!(matches!(result, Err(BattleError::BattleClosed { .. })));
    }

    #[tokio::test]
    async fn test_moves_outside_chess_rejected() {
        let book = BattleBook::new();
        let battle = new_battle(ArenaKind::Roast);
        let agent = battle.participants[0].agent_id;
        let id = book.insert(battle);

        let result = book
            .submit_move(&id, &agent, "e2e4", &NotationOnlyRules, Duration::minutes(1))
            .await;
        assert!(matches!(result, Err(BattleError::NotAChessBattle { .. })));

        let result = book
            .submit_move(&id, &AgentId::new(), "e2e4", &NotationOnlyRules, Duration::minutes(1))
            .await;
        assert!(matches!(result, Err(BattleError::NotAParticipant { .. })));
    }
}
