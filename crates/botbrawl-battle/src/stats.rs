//! Arena ratings per (agent, kind)

use std::collections::HashMap;

use botbrawl_rating::{ArenaStat, Outcome};
use botbrawl_types::{AgentId, ArenaKind};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub agent_id: AgentId,
    #[serde(flatten)]
    pub stat: ArenaStat,
}

/// Every agent's rating record, keyed by arena kind
pub struct StatBook {
    default_rating: i32,
    stats: RwLock<HashMap<(AgentId, ArenaKind), ArenaStat>>,
}

impl StatBook {
    pub fn new(default_rating: i32) -> Self {
        Self {
            default_rating,
            stats: RwLock::new(HashMap::new()),
        }
    }

    /// Current record; an agent that never fought this kind gets the default
    pub fn get(&self, agent_id: &AgentId, kind: ArenaKind) -> ArenaStat {
        self.stats
            .read()
            .get(&(*agent_id, kind))
            .cloned()
            .unwrap_or_else(|| ArenaStat::new(self.default_rating))
    }

    pub fn rating(&self, agent_id: &AgentId, kind: ArenaKind) -> i32 {
        self.get(agent_id, kind).rating
    }

    /// Apply one settled contest to an agent's record
    pub fn apply(&self, agent_id: &AgentId, kind: ArenaKind, delta: i32, outcome: Outcome) -> ArenaStat {
        let mut stats = self.stats.write();
        let stat = stats
            .entry((*agent_id, kind))
            .or_insert_with(|| ArenaStat::new(self.default_rating));
        stat.apply(delta, outcome);
        stat.clone()
    }

    /// Agents ranked by rating, highest first; ties broken by wins
    pub fn leaderboard(&self, kind: ArenaKind, limit: usize) -> Vec<LeaderboardEntry> {
        let mut rows: Vec<(AgentId, ArenaStat)> = self
            .stats
            .read()
            .iter()
            .filter(|((_, k), _)| *k == kind)
            .map(|((agent_id, _), stat)| (*agent_id, stat.clone()))
            .collect();

        rows.sort_by(|a, b| {
            b.1.rating
                .cmp(&a.1.rating)
                .then_with(|| b.1.wins.cmp(&a.1.wins))
                .then_with(|| a.0.cmp(&b.0))
        });

        rows.into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, (agent_id, stat))| LeaderboardEntry {
                rank: i + 1,
                agent_id,
                stat,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record() {
        let book = StatBook::new(1200);
        let stat = book.get(&AgentId::new(), ArenaKind::Roast);
        assert_eq!(stat.rating, 1200);
        assert_eq!(stat.battles(), 0);
    }

    #[test]
    fn test_kinds_are_separate() {
        let book = StatBook::new(1200);
        let agent = AgentId::new();
        book.apply(&agent, ArenaKind::Roast, 16, Outcome::Win);

        assert_eq!(book.rating(&agent, ArenaKind::Roast), 1216);
        assert_eq!(book.rating(&agent, ArenaKind::Debate), 1200);
    }

    #[test]
    fn test_leaderboard_order() {
        let book = StatBook::new(1200);
        let low = AgentId::new();
        let high = AgentId::new();
        let other_kind = AgentId::new();
        book.apply(&low, ArenaKind::Roast, -16, Outcome::Loss);
        book.apply(&high, ArenaKind::Roast, 20, Outcome::Win);
        book.apply(&other_kind, ArenaKind::Chess, 50, Outcome::Win);

        let board = book.leaderboard(ArenaKind::Roast, 10);
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].agent_id, high);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[1].agent_id, low);

        assert_eq!(book.leaderboard(ArenaKind::Roast, 1).len(), 1);
    }
}
