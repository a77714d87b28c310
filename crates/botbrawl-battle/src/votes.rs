//! Per-battle vote ledger

use std::collections::{BTreeMap, HashMap};

use botbrawl_types::{OwnerId, Side};
use serde::{Deserialize, Serialize};

/// One vote per voter; counts kept per side
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoteLedger {
    #[serde(skip)]
    voters: HashMap<OwnerId, Side>,
    counts: BTreeMap<Side, u32>,
}

impl VoteLedger {
    pub fn new(sides: &[Side]) -> Self {
        Self {
            voters: HashMap::new(),
            counts: sides.iter().map(|side| (*side, 0)).collect(),
        }
    }

    /// Record a vote; false when the voter already voted
    pub fn cast(&mut self, voter: OwnerId, side: Side) -> bool {
        if self.voters.contains_key(&voter) {
            return false;
        }
        self.voters.insert(voter, side);
        *self.counts.entry(side).or_insert(0) += 1;
        true
    }

    pub fn has_voted(&self, voter: &OwnerId) -> bool {
        self.voters.contains_key(voter)
    }

    pub fn count(&self, side: Side) -> u32 {
        self.counts.get(&side).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn counts(&self) -> &BTreeMap<Side, u32> {
        &self.counts
    }

    /// Counts as a fixed array indexed by side (C is 0 in two-party battles)
    pub fn tally(&self) -> [u32; 3] {
        [self.count(Side::A), self.count(Side::B), self.count(Side::C)]
    }

    /// Side with the most votes; a tie for the top (including no votes) is a draw
    pub fn leader(&self) -> Option<Side> {
        let top = self.counts.values().copied().max()?;
        let mut leaders = self.counts.iter().filter(|(_, count)| **count == top);
        match (leaders.next(), leaders.next()) {
            (Some((side, _)), None) => Some(*side),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_vote_per_voter() {
        let mut ledger = VoteLedger::new(&[Side::A, Side::B]);
        let voter = OwnerId::new();
        assert!(ledger.cast(voter, Side::A));
        assert!(!ledger.cast(voter, Side::B));
        assert_eq!(ledger.count(Side::A), 1);
        assert_eq!(ledger.count(Side::B), 0);
        assert!(ledger.has_voted(&voter));
    }

    #[test]
    fn test_leader() {
        let mut ledger = VoteLedger::new(&[Side::A, Side::B]);
        assert_eq!(ledger.leader(), None);

        ledger.cast(OwnerId::new(), Side::B);
        assert_eq!(ledger.leader(), Some(Side::B));

        ledger.cast(OwnerId::new(), Side::A);
        assert_eq!(ledger.leader(), None);
    }

    #[test]
    fn test_three_way_tie_for_top_is_draw() {
        let mut ledger = VoteLedger::new(&[Side::A, Side::B, Side::C]);
        ledger.cast(OwnerId::new(), Side::A);
        ledger.cast(OwnerId::new(), Side::C);
        ledger.cast(OwnerId::new(), Side::B);
        ledger.cast(OwnerId::new(), Side::C);
        assert_eq!(ledger.leader(), Some(Side::C));
        assert_eq!(ledger.tally(), [1, 1, 2]);

        ledger.cast(OwnerId::new(), Side::A);
        assert_eq!(ledger.leader(), None);
    }
}
