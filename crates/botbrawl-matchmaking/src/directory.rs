//! Agent directory contract and an in-memory implementation

use std::collections::HashMap;

use async_trait::async_trait;
use botbrawl_types::{AgentId, OwnerId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// What the platform knows about an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: AgentId,
    pub owner_id: OwnerId,
    pub display_name: String,
    /// Agents are never deleted, only deactivated
    pub active: bool,
}

/// Lookup of agents by id
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn lookup(&self, agent_id: &AgentId) -> Option<AgentProfile>;
}

/// Directory backed by a map; used by tests and single-node runs
#[derive(Default)]
pub struct InMemoryAgentDirectory {
    agents: RwLock<HashMap<AgentId, AgentProfile>>,
}

impl InMemoryAgentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new active agent
    pub fn register(&self, owner_id: OwnerId, display_name: impl Into<String>) -> AgentProfile {
        let profile = AgentProfile {
            agent_id: AgentId::new(),
            owner_id,
            display_name: display_name.into(),
            active: true,
        };
        self.agents.write().insert(profile.agent_id, profile.clone());
        profile
    }

    pub fn insert(&self, profile: AgentProfile) {
        self.agents.write().insert(profile.agent_id, profile);
    }

    /// Flip the active flag; false when the agent is unknown
    pub fn set_active(&self, agent_id: &AgentId, active: bool) -> bool {
        match self.agents.write().get_mut(agent_id) {
            Some(profile) => {
                profile.active = active;
                true
            }
            None => false,
        }
    }

    pub fn owned_by(&self, owner_id: &OwnerId) -> Vec<AgentProfile> {
        self.agents
            .read()
            .values()
            .filter(|p| &p.owner_id == owner_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AgentDirectory for InMemoryAgentDirectory {
    async fn lookup(&self, agent_id: &AgentId) -> Option<AgentProfile> {
        self.agents.read().get(agent_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_deactivate() {
        let directory = InMemoryAgentDirectory::new();
        let owner = OwnerId::new();
        let agent = directory.register(owner, "roastmaster");

        assert!(directory.lookup(&agent.agent_id).await.unwrap().active);
        assert!(directory.set_active(&agent.agent_id, false));
        assert!(!directory.lookup(&agent.agent_id).await.unwrap().active);
        assert!(!directory.set_active(&AgentId::new(), false));
        assert_eq!(directory.owned_by(&owner).len(), 1);
    }
}
