//! Chess games played inside a battle
//!
//! Legality is not decided here: every move goes through a [`ChessRules`]
//! engine, which returns the new position and, once the game is over, its
//! result. Side A plays white.

use async_trait::async_trait;
use botbrawl_types::{AgentId, Side};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard starting position
pub const START_POSITION: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Finished game result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameResult {
    Decisive { winner: Side },
    Draw,
}

impl GameResult {
    pub fn winner(&self) -> Option<Side> {
        match self {
            Self::Decisive { winner } => Some(*winner),
            Self::Draw => None,
        }
    }
}

/// Engine answer for an accepted move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub position: String,
    pub result: Option<GameResult>,
}

/// External chess rules engine
#[async_trait]
pub trait ChessRules: Send + Sync {
    /// Apply `mv` (made by `mover`) to `position`; `Err` carries the reason a
    /// move is illegal
    async fn apply(&self, position: &str, mover: Side, mv: &str) -> Result<MoveOutcome, String>;
}

/// Accepts any well-formed coordinate move (`e2e4`, `e7e8q`) and the words
/// `resign` and `draw`; it does not check legality
///
/// Intended for offline runs where no rules engine is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotationOnlyRules;

fn is_square(file: u8, rank: u8) -> bool {
    (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank)
}

#[async_trait]
impl ChessRules for NotationOnlyRules {
    async fn apply(&self, position: &str, mover: Side, mv: &str) -> Result<MoveOutcome, String> {
        let mv = mv.trim().to_ascii_lowercase();
        match mv.as_str() {
            "resign" => {
                let winner = if mover == Side::A { Side::B } else { Side::A };
                return Ok(MoveOutcome {
                    position: position.to_string(),
                    result: Some(GameResult::Decisive { winner }),
                });
            }
            "draw" => {
                return Ok(MoveOutcome {
                    position: position.to_string(),
                    result: Some(GameResult::Draw),
                })
            }
            _ => {}
        }

        let bytes = mv.as_bytes();
        let well_formed = matches!(bytes.len(), 4 | 5)
            && is_square(bytes[0], bytes[1])
            && is_square(bytes[2], bytes[3])
            && bytes[..2] != bytes[2..4]
            && (bytes.len() == 4 || b"qrbn".contains(&bytes[4]));
        if !well_formed {
            return Err(format!("'{}' is not a coordinate move", mv));
        }

        Ok(MoveOutcome {
            position: format!("{} {}", position, mv),
            result: None,
        })
    }
}

/// A played move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChessMove {
    pub side: Side,
    pub agent_id: AgentId,
    pub notation: String,
    pub played_at: DateTime<Utc>,
}

/// Game state carried by a chess battle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChessGame {
    pub position: String,
    pub to_move: Side,
    pub moves: Vec<ChessMove>,
    pub result: Option<GameResult>,
}

impl Default for ChessGame {
    fn default() -> Self {
        Self {
            position: START_POSITION.to_string(),
            to_move: Side::A,
            moves: Vec::new(),
            result: None,
        }
    }
}

impl ChessGame {
    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    /// Record an accepted move and hand the turn over
    pub fn record(&mut self, agent_id: AgentId, notation: &str, outcome: MoveOutcome) {
        self.moves.push(ChessMove {
            side: self.to_move,
            agent_id,
            notation: notation.to_string(),
            played_at: Utc::now(),
        });
        self.position = outcome.position;
        self.result = outcome.result;
        self.to_move = if self.to_move == Side::A { Side::B } else { Side::A };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notation_rules_accept_coordinates() {
        let rules = NotationOnlyRules;
        let outcome = rules.apply(START_POSITION, Side::A, "e2e4").await.unwrap();
        assert!(outcome.result.is_none());
        assert!(rules.apply(START_POSITION, Side::A, "e7e8q").await.is_ok());
    }

    #[tokio::test]
    async fn test_notation_rules_reject_garbage() {
        let rules = NotationOnlyRules;
        assert!(rules.apply(START_POSITION, Side::A, "e2e2").await.is_err());
        assert!(rules.apply(START_POSITION, Side::A, "z9e4").await.is_err());
        assert!(rules.apply(START_POSITION, Side::A, "castle").await.is_err());
    }

    #[tokio::test]
    async fn test_resign_and_draw() {
        let rules = NotationOnlyRules;
        let outcome = rules.apply(START_POSITION, Side::B, "resign").await.unwrap();
        assert_eq!(outcome.result, Some(GameResult::Decisive { winner: Side::A }));

        let outcome = rules.apply(START_POSITION, Side::A, "draw").await.unwrap();
        assert_eq!(outcome.result.and_then(|r| r.winner()), None);
        assert_eq!(outcome.result, Some(GameResult::Draw));
    }

    #[test]
    fn test_record_alternates_turns() {
        let mut game = ChessGame::default();
        let white = AgentId::new();
        game.record(
            white,
            "e2e4",
            MoveOutcome {
                position: "p1".to_string(),
                result: None,
            },
        );
        assert_eq!(game.to_move, Side::B);
        assert_eq!(game.moves[0].side, Side::A);
        assert_eq!(game.position, "p1");
    }
}
