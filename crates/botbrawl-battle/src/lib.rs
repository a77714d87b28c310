//! BotBrawl Battle - Contest records and their state machine
//!
//! A battle moves through `responding`, then `voting` or `judging`, and ends
//! `completed` or `aborted`. Requests may append to a battle (votes,
//! responses, chess moves) while its phase allows it; only the orchestrator
//! moves it between phases.
//!
//! Also home to the [`StatBook`] holding every agent's rating per arena kind.

mod battle;
mod book;
mod chess;
mod stats;
mod votes;

pub use battle::{Battle, BattlePhase, Participant, RatingChange, StoredVerdict};
pub use book::{BattleBook, BattleHandle};
pub use chess::{ChessGame, ChessMove, ChessRules, GameResult, MoveOutcome, NotationOnlyRules, START_POSITION};
pub use stats::{LeaderboardEntry, StatBook};
pub use votes::VoteLedger;

use botbrawl_types::{AgentId, ArenaKind, BattleId, BrawlError, Side};
use thiserror::Error;

/// Errors from battle operations
#[derive(Error, Debug, Clone)]
pub enum BattleError {
    #[error("Battle not found: {battle_id}")]
    NotFound { battle_id: BattleId },

    #[error("{kind} needs {expected} participants, got {got}")]
    WrongParticipantCount {
        kind: ArenaKind,
        expected: usize,
        got: usize,
    },

    #[error("Invalid phase transition from {from} to {to}")]
    InvalidTransition { from: BattlePhase, to: BattlePhase },

    #[error("Side {side} is not part of this battle")]
    InvalidSide { side: Side },

    #[error("{kind} battles are not decided by votes")]
    NotVotable { kind: ArenaKind },

    #[error("Voting is closed on battle {battle_id} ({phase})")]
    VotingClosed { battle_id: BattleId, phase: BattlePhase },

    #[error("Already voted on battle {battle_id}")]
    AlreadyVoted { battle_id: BattleId },

    #[error("Battle {battle_id} is {phase}")]
    BattleClosed { battle_id: BattleId, phase: BattlePhase },

    #[error("Agent {agent_id} is not in this battle")]
    NotAParticipant { agent_id: AgentId },

    #[error("Battle {battle_id} is not a chess game")]
    NotAChessBattle { battle_id: BattleId },

    #[error("It is not {agent_id}'s turn")]
    NotYourTurn { agent_id: AgentId },

    #[error("Illegal move {mv}: {reason}")]
    IllegalMove { mv: String, reason: String },
}

pub type Result<T> = std::result::Result<T, BattleError>;

impl From<BattleError> for BrawlError {
    fn from(err: BattleError) -> Self {
        match err {
            BattleError::NotFound { battle_id } => BrawlError::not_found("Battle", battle_id),
            BattleError::InvalidSide { side } => BrawlError::InvalidSide {
                side: side.to_string(),
            },
            BattleError::NotVotable { kind } => {
                BrawlError::invalid_input("battle", format!("{} battles are not decided by votes", kind))
            }
            BattleError::VotingClosed { battle_id, phase } | BattleError::BattleClosed { battle_id, phase } => {
                BrawlError::BattleClosed {
                    battle_id: battle_id.to_string(),
                    phase: phase.to_string(),
                }
            }
            BattleError::AlreadyVoted { battle_id } => BrawlError::AlreadyVoted {
                battle_id: battle_id.to_string(),
            },
            BattleError::NotAParticipant { agent_id } => BrawlError::Forbidden {
                reason: format!("agent {} is not in this battle", agent_id),
            },
            BattleError::NotAChessBattle { battle_id } => {
                BrawlError::invalid_input("battle", format!("{} is not a chess game", battle_id))
            }
            BattleError::NotYourTurn { agent_id } => BrawlError::NotYourTurn {
                agent_id: agent_id.to_string(),
            },
            BattleError::IllegalMove { mv, .. } => BrawlError::IllegalMove { mv },
            err @ (BattleError::WrongParticipantCount { .. } | BattleError::InvalidTransition { .. }) => {
                BrawlError::internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botbrawl_types::ErrorClass;

    #[test]
    fn test_error_mapping() {
        let err: BrawlError = BattleError::AlreadyVoted {
            battle_id: BattleId::new(),
        }
        .into();
        assert_eq!(err.class(), ErrorClass::StateConflict);

        let err: BrawlError = BattleError::VotingClosed {
            battle_id: BattleId::new(),
            phase: BattlePhase::Completed,
        }
        .into();
        assert_eq!(err.status_code(), 409);

        let err: BrawlError = BattleError::InvalidSide { side: Side::C }.into();
        assert_eq!(err.class(), ErrorClass::Validation);

        let err: BrawlError = BattleError::NotFound {
            battle_id: BattleId::new(),
        }
        .into();
        assert_eq!(err.status_code(), 404);
    }
}
