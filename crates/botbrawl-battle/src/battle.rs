//! The battle record and its phase machine

use std::collections::BTreeMap;

use botbrawl_types::{AgentId, ArenaKind, BattleId, OwnerId, PoolId, Resolution, Side};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::chess::ChessGame;
use crate::votes::VoteLedger;
use crate::{BattleError, Result};

/// Battle lifecycle phases
///
/// ```text
/// responding ──► voting ───► completed
///     │      └─► judging ──► completed
///     └──────────┴─────────► aborted
/// ```
///
/// Chess battles stay in `responding` while moves are played and go straight
/// to `completed` once a result is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattlePhase {
    Responding,
    Voting,
    Judging,
    Completed,
    Aborted,
}

impl BattlePhase {
    pub fn valid_transitions(&self) -> &'static [BattlePhase] {
        match self {
            Self::Responding => &[Self::Voting, Self::Judging, Self::Completed, Self::Aborted],
            Self::Voting => &[Self::Completed],
            Self::Judging => &[Self::Completed, Self::Aborted],
            Self::Completed | Self::Aborted => &[],
        }
    }

    pub fn can_transition_to(&self, target: BattlePhase) -> bool {
        self.valid_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Responding => "responding",
            Self::Voting => "voting",
            Self::Judging => "judging",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for BattlePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An agent taking part in a battle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub side: Side,
    pub agent_id: AgentId,
    pub owner_id: OwnerId,
    pub display_name: String,
}

/// Rating movement applied to one participant at settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingChange {
    pub agent_id: AgentId,
    pub side: Side,
    pub before: i32,
    pub after: i32,
    pub delta: i32,
}

/// Judge panel result as stored on the battle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVerdict {
    pub average_a: f64,
    pub average_b: f64,
    pub winner: Option<Side>,
    /// Per-judge reasoning, in panel order
    pub reasoning: Vec<String>,
    pub fallbacks: usize,
}

/// A contest between two or three agents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battle {
    pub id: BattleId,
    pub kind: ArenaKind,
    pub participants: Vec<Participant>,
    pub phase: BattlePhase,
    pub responses: BTreeMap<Side, String>,
    pub votes: VoteLedger,
    pub verdict: Option<StoredVerdict>,
    pub chess: Option<ChessGame>,
    /// When the current phase times out: generation deadline while
    /// responding or judging, voting deadline while voting
    pub deadline: DateTime<Utc>,
    pub winning_side: Option<Side>,
    /// `None` once completed means a draw
    pub winner: Option<AgentId>,
    /// Written once at completion
    pub rating_changes: Vec<RatingChange>,
    pub pool_id: Option<PoolId>,
    pub recap: Option<String>,
    pub abort_reason: Option<String>,
    pub underground: bool,
    pub phase_history: Vec<(BattlePhase, DateTime<Utc>)>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Battle {
    /// New battle in `responding`; `generation_timeout` bounds how long the
    /// agents may take to respond
    pub fn new(kind: ArenaKind, participants: Vec<Participant>, generation_timeout: Duration) -> Result<Self> {
        if participants.len() != kind.parties() {
            return Err(BattleError::WrongParticipantCount {
                kind,
                expected: kind.parties(),
                got: participants.len(),
            });
        }
        let now = Utc::now();

        Ok(Self {
            id: BattleId::new(),
            kind,
            participants,
            phase: BattlePhase::Responding,
            responses: BTreeMap::new(),
            votes: VoteLedger::new(kind.sides()),
            verdict: None,
            chess: (kind == ArenaKind::Chess).then(ChessGame::default),
            deadline: now + generation_timeout,
            winning_side: None,
            winner: None,
            rating_changes: Vec::new(),
            pool_id: None,
            recap: None,
            abort_reason: None,
            underground: kind == ArenaKind::Underground,
            phase_history: vec![(BattlePhase::Responding, now)],
            created_at: now,
            completed_at: None,
        })
    }

    pub fn sides(&self) -> &'static [Side] {
        self.kind.sides()
    }

    pub fn participant(&self, side: Side) -> Option<&Participant> {
        self.participants.iter().find(|p| p.side == side)
    }

    pub fn side_of(&self, agent_id: &AgentId) -> Option<Side> {
        self.participants
            .iter()
            .find(|p| &p.agent_id == agent_id)
            .map(|p| p.side)
    }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.participants.iter().map(|p| p.agent_id).collect()
    }

    /// Move to `target`; phases never move backward
    pub fn transition_to(&mut self, target: BattlePhase) -> Result<()> {
        if !self.phase.can_transition_to(target) {
            return Err(BattleError::InvalidTransition {
                from: self.phase,
                to: target,
            });
        }
        let now = Utc::now();
        if target.is_terminal() {
            self.completed_at = Some(now);
        }
        self.phase = target;
        self.phase_history.push((target, now));
        Ok(())
    }

    /// Open the voting window
    pub fn enter_voting(&mut self, window: Duration) -> Result<()> {
        self.transition_to(BattlePhase::Voting)?;
        self.deadline = Utc::now() + window;
        Ok(())
    }

    /// Hand the battle to the judges; `timeout` bounds the wait for a verdict
    pub fn enter_judging(&mut self, timeout: Duration) -> Result<()> {
        self.transition_to(BattlePhase::Judging)?;
        self.deadline = Utc::now() + timeout;
        Ok(())
    }

    /// Record the outcome and close the battle
    pub fn complete(&mut self, winning_side: Option<Side>, rating_changes: Vec<RatingChange>) -> Result<()> {
        self.transition_to(BattlePhase::Completed)?;
        self.winning_side = winning_side;
        self.winner = winning_side
            .and_then(|side| self.participant(side))
            .map(|p| p.agent_id);
        self.rating_changes = rating_changes;
        Ok(())
    }

    pub fn abort(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition_to(BattlePhase::Aborted)?;
        self.abort_reason = Some(reason.into());
        Ok(())
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    pub fn all_responses_in(&self) -> bool {
        self.sides().iter().all(|side| self.responses.contains_key(side))
    }

    /// Store a generated response; the first write for a side wins
    pub fn record_response(&mut self, side: Side, text: String) -> Result<bool> {
        if !self.sides().contains(&side) {
            return Err(BattleError::InvalidSide { side });
        }
        if self.phase != BattlePhase::Responding {
            return Ok(false);
        }
        if self.responses.contains_key(&side) {
            return Ok(false);
        }
        self.responses.insert(side, text);
        Ok(true)
    }

    /// Whether the community may vote right now
    pub fn accepts_votes(&self) -> bool {
        self.kind.resolution() == Resolution::Vote
            && matches!(self.phase, BattlePhase::Responding | BattlePhase::Voting)
    }

    pub fn cast_vote(&mut self, voter: OwnerId, side: Side) -> Result<()> {
        if self.kind.resolution() != Resolution::Vote {
            return Err(BattleError::NotVotable { kind: self.kind });
        }
        if !self.accepts_votes() {
            return Err(BattleError::VotingClosed {
                battle_id: self.id,
                phase: self.phase,
            });
        }
        if !self.sides().contains(&side) {
            return Err(BattleError::InvalidSide { side });
        }
        if !self.votes.cast(voter, side) {
            return Err(BattleError::AlreadyVoted { battle_id: self.id });
        }
        Ok(())
    }

    /// Store the judge verdict; only the first verdict counts
    pub fn record_verdict(&mut self, verdict: StoredVerdict) -> bool {
        if self.phase != BattlePhase::Judging || self.verdict.is_some() {
            return false;
        }
        self.verdict = Some(verdict);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn participants(kind: ArenaKind) -> Vec<Participant> {
        kind.sides()
            .iter()
            .map(|side| Participant {
                side: *side,
                agent_id: AgentId::new(),
                owner_id: OwnerId::new(),
                display_name: format!("bot-{}", side),
            })
            .collect()
    }

    fn battle(kind: ArenaKind) -> Battle {
        Battle::new(kind, participants(kind), Duration::minutes(10)).unwrap()
    }

    #[test]
    fn test_new_battle_defaults() {
        let battle = battle(ArenaKind::Underground);
        assert_eq!(battle.phase, BattlePhase::Responding);
        assert!(battle.underground);
        assert!(battle.chess.is_none());
        assert!(battle.deadline > battle.created_at);

        let chess = self::battle(ArenaKind::Chess);
        assert!(chess.chess.is_some());
    }

    #[test]
    fn test_participant_count_checked() {
        let result = Battle::new(
            ArenaKind::Royale,
            participants(ArenaKind::Roast),
            Duration::minutes(10),
        );
        assert!(matches!(result, Err(BattleError::WrongParticipantCount { .. })));
    }

    #[test]
    fn test_phases_never_move_backward() {
        let mut battle = battle(ArenaKind::Roast);
        battle.enter_voting(Duration::minutes(5)).unwrap();
        assert!(battle.transition_to(BattlePhase::Responding).is_err());
        assert!(battle.transition_to(BattlePhase::Aborted).is_err());

        battle.complete(Some(Side::A), vec![]).unwrap();
        assert!(battle.transition_to(BattlePhase::Voting).is_err());
        assert!(battle.complete(None, vec![]).is_err());
        assert_eq!(battle.winning_side, Some(Side::A));
        assert_eq!(battle.winner, Some(battle.participants[0].agent_id));
        assert_eq!(battle.phase_history.len(), 3);
    }

    #[test]
    fn test_first_response_wins() {
        let mut battle = battle(ArenaKind::Roast);
        assert!(battle.record_response(Side::A, "first".to_string()).unwrap());
        assert!(!battle.record_response(Side::A, "second".to_string()).unwrap());
        assert_eq!(battle.responses[&Side::A], "first");
        assert!(!battle.all_responses_in());

        battle.record_response(Side::B, "reply".to_string()).unwrap();
        assert!(battle.all_responses_in());

        assert!(matches!(
            battle.record_response(Side::C, "extra".to_string()),
            Err(BattleError::InvalidSide { side: Side::C })
        ));
    }

    #[test]
    fn test_votes_rules() {
        let mut battle = battle(ArenaKind::Roast);
        let voter = OwnerId::new();

        battle.cast_vote(voter, Side::A).unwrap();
        assert!(matches!(
            battle.cast_vote(voter, Side::B),
            Err(BattleError::AlreadyVoted { .. })
        ));
        assert!(matches!(
            battle.cast_vote(OwnerId::new(), Side::C),
            Err(BattleError::InvalidSide { .. })
        ));

        battle.enter_voting(Duration::minutes(5)).unwrap();
        battle.cast_vote(OwnerId::new(), Side::B).unwrap();

        battle.complete(None, vec![]).unwrap();
        assert!(matches!(
            battle.cast_vote(OwnerId::new(), Side::B),
            Err(BattleError::VotingClosed { .. })
        ));
    }

    #[test]
    fn test_judged_battles_take_no_votes() {
        let mut battle = battle(ArenaKind::Underground);
        assert!(matches!(
            battle.cast_vote(OwnerId::new(), Side::A),
            Err(BattleError::NotVotable { .. })
        ));
    }

    #[test]
    fn test_verdict_recorded_once_while_judging() {
        let mut battle = battle(ArenaKind::Underground);
        let verdict = StoredVerdict {
            average_a: 7.0,
            average_b: 6.0,
            winner: Some(Side::A),
            reasoning: vec![],
            fallbacks: 0,
        };
        assert!(!battle.record_verdict(verdict.clone()));

        battle.enter_judging(Duration::minutes(10)).unwrap();
        assert!(battle.record_verdict(verdict.clone()));
        assert!(!battle.record_verdict(StoredVerdict {
            winner: Some(Side::B),
            ..verdict
        }));
        assert_eq!(battle.verdict.as_ref().and_then(|v| v.winner), Some(Side::A));
    }

    #[test]
    fn test_abort_only_from_live_phases() {
        let mut battle = battle(ArenaKind::Underground);
        battle.enter_judging(Duration::minutes(10)).unwrap();
        battle.abort("verdict never arrived").unwrap();
        assert_eq!(battle.phase, BattlePhase::Aborted);
        assert!(battle.abort("again").is_err());
        assert_eq!(battle.abort_reason.as_deref(), Some("verdict never arrived"));
    }
}
