//! BotBrawl Ledger - Lock-and-settle balances for wagering
//!
//! Every owner has one account with two balances:
//! - `available`: spendable funds
//! - `locked`: funds committed to open stakes
//!
//! # Invariants
//!
//! 1. Neither balance ever goes negative
//! 2. Every mutation appends a journal entry
//! 3. Settlement of a given reference (a stake) is applied at most once
//! 4. Each operation is atomic under the ledger lock

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use botbrawl_types::{BrawlError, EntryId, OwnerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur in ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Account not found: {account}")]
    AccountNotFound { account: OwnerId },

    #[error("Insufficient balance in {account}: have {available}, need {required}")]
    InsufficientBalance {
        account: OwnerId,
        available: u64,
        required: u64,
    },

    #[error("Insufficient locked funds in {account}: have {locked}, need {required}")]
    InsufficientLocked {
        account: OwnerId,
        locked: u64,
        required: u64,
    },

    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<LedgerError> for BrawlError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AccountNotFound { account } => BrawlError::not_found("Account", account),
            LedgerError::InsufficientBalance {
                account,
                available,
                required,
            } => BrawlError::InsufficientFunds {
                account: account.to_string(),
                requested: required,
                available,
            },
            LedgerError::InvalidAmount { message } => BrawlError::invalid_input("amount", message),
            err @ LedgerError::InsufficientLocked { .. } => BrawlError::internal(err.to_string()),
        }
    }
}

/// Both balances of an account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub available: u64,
    pub locked: u64,
}

impl Balance {
    pub fn total(&self) -> u64 {
        self.available + self.locked
    }
}

/// What a journal entry did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Funds added to available (deposit / faucet)
    Credit,
    /// Available moved to locked for a new stake
    Lock,
    /// Locked moved back to available (refund)
    Release,
    /// Locked funds removed for a losing or settled stake
    Discard,
    /// Winnings credited to available
    Payout,
}

/// A single journal entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,
    pub account: OwnerId,
    pub kind: EntryKind,
    pub amount: u64,
    pub balance_after: Balance,
    /// Pool, stake or deposit reference this entry belongs to
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<OwnerId, Balance>,
    entries: Vec<LedgerEntry>,
    /// References whose settlement has already been applied. Kept for the
    /// life of the process, like the journal: dropping one would let a
    /// replayed settlement pay twice.
    settled: HashSet<String>,
}

impl LedgerState {
    fn record(&mut self, account: OwnerId, kind: EntryKind, amount: u64, correlation_id: &str) {
        let balance_after = self.accounts.get(&account).copied().unwrap_or_default();
        self.entries.push(LedgerEntry {
            entry_id: EntryId::new(),
            account,
            kind,
            amount,
            balance_after,
            correlation_id: correlation_id.to_string(),
            created_at: Utc::now(),
        });
    }
}

/// The BotBrawl ledger
///
/// Thread-safe; clones share the same underlying state.
#[derive(Clone, Default)]
pub struct Ledger {
    state: Arc<RwLock<LedgerState>>,
}

impl Ledger {
    /// Create a new in-memory ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Balances of an account (zero for an unknown account)
    pub async fn balance(&self, account: &OwnerId) -> Balance {
        self.state
            .read()
            .await
            .accounts
            .get(account)
            .copied()
            .unwrap_or_default()
    }

    /// Credit available funds, creating the account on first use
    pub async fn deposit(
        &self,
        account: &OwnerId,
        amount: u64,
        correlation_id: &str,
    ) -> Result<Balance> {
        ensure_positive(amount)?;

        let mut state = self.state.write().await;
        let balance = state.accounts.entry(*account).or_default();
        balance.available = balance
            .available
            .checked_add(amount)
            .ok_or_else(|| LedgerError::InvalidAmount {
                message: "Balance overflow".to_string(),
            })?;
        let after = *balance;
        state.record(*account, EntryKind::Credit, amount, correlation_id);

        tracing::debug!(account = %account, amount, "Ledger deposit");
        Ok(after)
    }

    /// Move `amount` from available to locked
    ///
    /// Fails without side effects when available funds are short.
    pub async fn lock(&self, account: &OwnerId, amount: u64, correlation_id: &str) -> Result<Balance> {
        ensure_positive(amount)?;

        let mut state = self.state.write().await;
        let balance = state.accounts.get_mut(account).ok_or(LedgerError::InsufficientBalance {
            account: *account,
            available: 0,
            required: amount,
        })?;

        if balance.available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: *account,
                available: balance.available,
                required: amount,
            });
        }

        balance.available -= amount;
        balance.locked += amount;
        let after = *balance;
        state.record(*account, EntryKind::Lock, amount, correlation_id);
        Ok(after)
    }

    /// Return `amount` of locked funds to available
    ///
    /// Applied at most once per `settlement_ref`; a repeat returns the current
    /// balance unchanged.
    pub async fn release(
        &self,
        account: &OwnerId,
        amount: u64,
        settlement_ref: &str,
    ) -> Result<Balance> {
        self.settle_lock(account, amount, amount, settlement_ref).await
    }

    /// Remove `locked_amount` from locked and credit `payout` to available
    ///
    /// A payout of zero discards the lock (losing stake); a payout equal to
    /// the lock is a refund. Applied at most once per `settlement_ref`.
    pub async fn settle_lock(
        &self,
        account: &OwnerId,
        locked_amount: u64,
        payout: u64,
        settlement_ref: &str,
    ) -> Result<Balance> {
        let mut state = self.state.write().await;

        if state.settled.contains(settlement_ref) {
            tracing::debug!(settlement_ref, "Settlement already applied, skipping");
            return Ok(state.accounts.get(account).copied().unwrap_or_default());
        }

        let balance = state
            .accounts
            .get_mut(account)
            .ok_or(LedgerError::AccountNotFound { account: *account })?;

        if balance.locked < locked_amount {
            return Err(LedgerError::InsufficientLocked {
                account: *account,
                locked: balance.locked,
                required: locked_amount,
            });
        }
        let new_available = balance
            .available
            .checked_add(payout)
            .ok_or_else(|| LedgerError::InvalidAmount {
                message: "Balance overflow".to_string(),
            })?;

        balance.locked -= locked_amount;
        balance.available = new_available;
        let after = *balance;

        if payout == locked_amount {
            state.record(*account, EntryKind::Release, payout, settlement_ref);
        } else {
            if locked_amount > 0 {
                state.record(*account, EntryKind::Discard, locked_amount, settlement_ref);
            }
            if payout > 0 {
                state.record(*account, EntryKind::Payout, payout, settlement_ref);
            }
        }
        state.settled.insert(settlement_ref.to_string());

        Ok(after)
    }

    /// Whether a settlement reference has already been applied
    pub async fn is_settled(&self, settlement_ref: &str) -> bool {
        self.state.read().await.settled.contains(settlement_ref)
    }

    /// All entries for an account, oldest first
    pub async fn account_entries(&self, account: &OwnerId) -> Vec<LedgerEntry> {
        self.state
            .read()
            .await
            .entries
            .iter()
            .filter(|e| &e.account == account)
            .cloned()
            .collect()
    }

    /// Entries linked to a correlation id
    pub async fn correlated_entries(&self, correlation_id: &str) -> Vec<LedgerEntry> {
        self.state
            .read()
            .await
            .entries
            .iter()
            .filter(|e| e.correlation_id == correlation_id)
            .cloned()
            .collect()
    }

    /// Get the total number of entries
    pub async fn entry_count(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Sum of all balances held by all accounts
    pub async fn total_held(&self) -> u64 {
        self.state
            .read()
            .await
            .accounts
            .values()
            .map(Balance::total)
            .sum()
    }
}

fn ensure_positive(amount: u64) -> Result<()> {
    if amount == 0 {
        return Err(LedgerError::InvalidAmount {
            message: "Amount must be greater than zero".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn funded(amount: u64) -> (Ledger, OwnerId) {
        let ledger = Ledger::new();
        let account = OwnerId::new();
        ledger.deposit(&account, amount, "faucet").await.unwrap();
        (ledger, account)
    }

    #[tokio::test]
    async fn test_deposit_and_balance() {
        let ledger = Ledger::new();
        let account = OwnerId::new();

        assert_eq!(ledger.balance(&account).await, Balance::default());

        let balance = ledger.deposit(&account, 1000, "faucet").await.unwrap();
        assert_eq!(balance.available, 1000);
        assert_eq!(balance.locked, 0);
    }

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let ledger = Ledger::new();
        let result = ledger.deposit(&OwnerId::new(), 0, "faucet").await;
        assert!(matches!(result, Err(LedgerError::InvalidAmount { .. })));
    }

    #[tokio::test]
    async fn test_lock_moves_funds() {
        let (ledger, account) = funded(500).await;

        let balance = ledger.lock(&account, 100, "stake-1").await.unwrap();
        assert_eq!(balance, Balance { available: 400, locked: 100 });
    }

    #[tokio::test]
    async fn test_lock_never_goes_negative() {
        let (ledger, account) = funded(100).await;

        let result = ledger.lock(&account, 200, "stake-1").await;
        assert!(matches!(result, Err(LedgerError::InsufficientBalance { available: 100, .. })));
        assert_eq!(ledger.balance(&account).await.available, 100);
    }

    #[tokio::test]
    async fn test_lock_unknown_account_is_insufficient() {
        let ledger = Ledger::new();
        let result = ledger.lock(&OwnerId::new(), 10, "stake-1").await;
        assert!(matches!(result, Err(LedgerError::InsufficientBalance { available: 0, .. })));
    }

    #[tokio::test]
    async fn test_settle_winning_lock() {
        let (ledger, account) = funded(500).await;
        ledger.lock(&account, 100, "stake-1").await.unwrap();

        let balance = ledger.settle_lock(&account, 100, 143, "stake-1").await.unwrap();
        assert_eq!(balance, Balance { available: 543, locked: 0 });
    }

    #[tokio::test]
    async fn test_settle_losing_lock_discards() {
        let (ledger, account) = funded(500).await;
        ledger.lock(&account, 50, "stake-1").await.unwrap();

        let balance = ledger.settle_lock(&account, 50, 0, "stake-1").await.unwrap();
        assert_eq!(balance, Balance { available: 450, locked: 0 });

        let kinds: Vec<_> = ledger
            .correlated_entries("stake-1")
            .await
            .into_iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(kinds, vec![EntryKind::Lock, EntryKind::Discard]);
    }

    #[tokio::test]
    async fn test_settlement_is_idempotent() {
        let (ledger, account) = funded(500).await;
        ledger.lock(&account, 100, "stake-1").await.unwrap();

        ledger.settle_lock(&account, 100, 143, "stake-1").await.unwrap();
        let again = ledger.settle_lock(&account, 100, 143, "stake-1").await.unwrap();

        assert_eq!(again, Balance { available: 543, locked: 0 });
        assert!(ledger.is_settled("stake-1").await);
    }

    #[tokio::test]
    async fn test_release_refunds_exactly() {
        let (ledger, account) = funded(300).await;
        ledger.lock(&account, 120, "stake-1").await.unwrap();

        let balance = ledger.release(&account, 120, "stake-1").await.unwrap();
        assert_eq!(balance, Balance { available: 300, locked: 0 });
    }

    #[tokio::test]
    async fn test_cannot_settle_more_than_locked() {
        let (ledger, account) = funded(300).await;
        ledger.lock(&account, 20, "stake-1").await.unwrap();

        let result = ledger.settle_lock(&account, 50, 0, "stake-1").await;
        assert!(matches!(result, Err(LedgerError::InsufficientLocked { .. })));
        assert!(!ledger.is_settled("stake-1").await);
    }

    #[tokio::test]
    async fn test_entry_tracking() {
        let (ledger, account) = funded(100).await;
        ledger.deposit(&account, 200, "faucet-2").await.unwrap();

        let entries = ledger.account_entries(&account).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].balance_after.available, 300);
        assert_eq!(ledger.entry_count().await, 2);
    }

    #[test]
    fn test_error_conversion() {
        let err: BrawlError = LedgerError::InsufficientBalance {
            account: OwnerId::new(),
            available: 5,
            required: 10,
        }
        .into();
        assert_eq!(err.error_code(), "INSUFFICIENT_FUNDS");
    }
}
