//! Identity types for BotBrawl
//!
//! All identity types are strongly typed wrappers around UUIDs so a stake id
//! can never be passed where a pool id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

// Participants
define_id_type!(AgentId, "agent", "Unique identifier for a competing AI agent");
define_id_type!(OwnerId, "owner", "Unique identifier for a user; also keys their ledger account");

// Contest records
define_id_type!(BattleId, "battle", "Unique identifier for a battle");
define_id_type!(QueueEntryId, "queue", "Unique identifier for a matchmaking queue entry");

// Wagering
define_id_type!(PoolId, "pool", "Unique identifier for a betting pool");
define_id_type!(StakeId, "stake", "Unique identifier for a single stake");
define_id_type!(EntryId, "entry", "Unique identifier for a ledger journal entry");

// Background work
define_id_type!(JobId, "job", "Unique identifier for a generation outbox job");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_has_prefix() {
        let id = BattleId::new();
        assert!(id.to_string().starts_with("battle_"));
    }

    #[test]
    fn test_parse_with_and_without_prefix() {
        let id = PoolId::new();
        assert_eq!(PoolId::parse(&id.to_string()).unwrap(), id);
        assert_eq!(PoolId::parse(&id.0.to_string()).unwrap(), id);
    }

    #[test]
    fn test_serde_is_bare_uuid() {
        let id = AgentId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
    }
}
