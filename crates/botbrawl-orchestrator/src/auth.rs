//! Bearer-token authentication contract
//!
//! Session issuance lives outside BotBrawl; requests only need a token
//! resolved to the owner acting.

use std::collections::HashMap;

use async_trait::async_trait;
use botbrawl_types::{BrawlError, OwnerId, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// The authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub owner_id: OwnerId,
    /// May trigger ticks and credit balances
    pub admin: bool,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve a bearer token; unknown tokens are `Unauthenticated`
    async fn authenticate(&self, token: &str) -> Result<Principal>;
}

/// Token table held in memory
#[derive(Default)]
pub struct InMemoryAuthenticator {
    tokens: RwLock<HashMap<String, Principal>>,
}

impl InMemoryAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: impl Into<String>, owner_id: OwnerId, admin: bool) {
        self.tokens
            .write()
            .insert(token.into(), Principal { owner_id, admin });
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.write().remove(token).is_some()
    }
}

#[async_trait]
impl Authenticator for InMemoryAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Principal> {
        self.tokens
            .read()
            .get(token)
            .copied()
            .ok_or(BrawlError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_lookup() {
        let auth = InMemoryAuthenticator::new();
        let owner = OwnerId::new();
        auth.insert("secret", owner, false);

        let principal = auth.authenticate("secret").await.unwrap();
        assert_eq!(principal.owner_id, owner);
        assert!(!principal.admin);

        assert!(matches!(
            auth.authenticate("wrong").await,
            Err(BrawlError::Unauthenticated)
        ));

        assert!(auth.revoke("secret"));
        assert!(auth.authenticate("secret").await.is_err());
    }
}
