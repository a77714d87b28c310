//! Queue entries and opponent selection

use botbrawl_types::{AgentId, ArenaKind, BattleId, QueueEntryId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Queue entry lifecycle; `Waiting` moves to exactly one terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Waiting,
    Matched,
    Cancelled,
    Expired,
}

/// An agent waiting for an opponent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: QueueEntryId,
    pub agent_id: AgentId,
    pub kind: ArenaKind,
    /// Only this agent may be matched against the entry
    pub challenge_target: Option<AgentId>,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub battle_id: Option<BattleId>,
}

impl QueueEntry {
    pub fn new(
        agent_id: AgentId,
        kind: ArenaKind,
        challenge_target: Option<AgentId>,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            id: QueueEntryId::new(),
            agent_id,
            kind,
            challenge_target,
            status: QueueStatus::Waiting,
            created_at: now,
            expires_at: now + ttl,
            battle_id: None,
        }
    }

    /// Waiting and not yet past expiry
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == QueueStatus::Waiting && now < self.expires_at
    }

    /// Whether this entry accepts `agent_id` as an opponent
    pub fn accepts(&self, agent_id: &AgentId) -> bool {
        self.challenge_target.map_or(true, |target| &target == agent_id)
    }
}

/// Result of an enqueue request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnqueueOutcome {
    Matched {
        battle_id: BattleId,
        entry_id: QueueEntryId,
    },
    Waiting {
        entry_id: QueueEntryId,
        expires_at: DateTime<Utc>,
    },
}

/// Pick opponents for `requester` among `candidates`
///
/// Candidates must already be live entries of the requester's kind. Entries
/// challenging the requester come first, then the oldest. Every member of the
/// group must accept every other member. Returns indices into `candidates`,
/// or `None` when no group of `needed` opponents can be formed.
pub fn select_opponents(requester: &QueueEntry, candidates: &[&QueueEntry], needed: usize) -> Option<Vec<usize>> {
    let mut order: Vec<usize> = (0..candidates.len())
        .filter(|&i| candidates[i].agent_id != requester.agent_id)
        .collect();
    order.sort_by_key(|&i| {
        let challenges_requester = candidates[i].challenge_target == Some(requester.agent_id);
        (!challenges_requester, candidates[i].created_at)
    });

    let mut picked: Vec<usize> = Vec::with_capacity(needed);
    for i in order {
        if picked.len() == needed {
            break;
        }
        let candidate = candidates[i];
        let members = std::iter::once(requester).chain(picked.iter().map(|&p| candidates[p]));
        let compatible = members
            .into_iter()
            .all(|member| {
                member.agent_id != candidate.agent_id
                    && member.accepts(&candidate.agent_id)
                    && candidate.accepts(&member.agent_id)
            });
        if compatible {
            picked.push(i);
        }
    }

    (picked.len() == needed).then_some(picked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(kind: ArenaKind, target: Option<AgentId>, age_secs: i64) -> QueueEntry {
        let now = Utc::now() - Duration::seconds(age_secs);
        QueueEntry::new(AgentId::new(), kind, target, now, Duration::hours(1))
    }

    #[test]
    fn test_liveness() {
        let e = entry(ArenaKind::Roast, None, 0);
        assert!(e.is_live(Utc::now()));
        assert!(!e.is_live(Utc::now() + Duration::hours(2)));
    }

    #[test]
    fn test_picks_oldest() {
        let requester = entry(ArenaKind::Roast, None, 0);
        let newer = entry(ArenaKind::Roast, None, 10);
        let older = entry(ArenaKind::Roast, None, 100);
        let candidates = vec![&newer, &older];

        assert_eq!(select_opponents(&requester, &candidates, 1), Some(vec![1]));
    }

    #[test]
    fn test_prefers_challenger_of_requester() {
        let requester = entry(ArenaKind::Roast, None, 0);
        let older = entry(ArenaKind::Roast, None, 100);
        let challenger = entry(ArenaKind::Roast, Some(requester.agent_id), 5);
        let candidates = vec![&older, &challenger];

        assert_eq!(select_opponents(&requester, &candidates, 1), Some(vec![1]));
    }

    #[test]
    fn test_skips_entries_challenging_someone_else() {
        let requester = entry(ArenaKind::Roast, None, 0);
        let busy = entry(ArenaKind::Roast, Some(AgentId::new()), 100);
        let candidates = vec![&busy];

        assert_eq!(select_opponents(&requester, &candidates, 1), None);
    }

    #[test]
    fn test_requester_challenge_only_matches_target() {
        let target = entry(ArenaKind::Roast, None, 10);
        let bystander = entry(ArenaKind::Roast, None, 100);
        let requester = entry(ArenaKind::Roast, Some(target.agent_id), 0);
        let candidates = vec![&bystander, &target];

        assert_eq!(select_opponents(&requester, &candidates, 1), Some(vec![1]));

        let only_bystander = vec![&bystander];
        assert_eq!(select_opponents(&requester, &only_bystander, 1), None);
    }

    #[test]
    fn test_three_way_needs_two() {
        let requester = entry(ArenaKind::Royale, None, 0);
        let first = entry(ArenaKind::Royale, None, 50);
        assert_eq!(select_opponents(&requester, &[&first], 2), None);

        let second = entry(ArenaKind::Royale, None, 20);
        let picked = select_opponents(&requester, &[&first, &second], 2).unwrap();
        assert_eq!(picked, vec![0, 1]);
    }

    #[test]
    fn test_three_way_group_must_accept_each_other() {
        let requester = entry(ArenaKind::Royale, None, 0);
        let open = entry(ArenaKind::Royale, None, 50);
        // A challenge admits only its target, so it cannot sit in a trio
        let challenger = entry(ArenaKind::Royale, Some(open.agent_id), 40);

        assert_eq!(select_opponents(&requester, &[&open, &challenger], 2), None);
    }
}
