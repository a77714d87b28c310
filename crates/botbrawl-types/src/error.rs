//! Error types for BotBrawl
//!
//! Every crate keeps its own error enum and converts into [`BrawlError`] at
//! the boundary, where the error class decides how a caller sees it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for BotBrawl operations
pub type Result<T> = std::result::Result<T, BrawlError>;

/// Broad failure class; decides the status a synchronous caller receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Caller sent something malformed (bad side, bad amount, bad kind)
    Validation,
    /// Caller is not authenticated or not allowed
    Auth,
    /// Resource is in a state that forbids the operation
    StateConflict,
    /// Caller lacks the resource (funds, an active agent)
    Resource,
    /// Unknown id
    NotFound,
    /// Too many requests
    RateLimited,
    /// An external collaborator failed or timed out
    Dependency,
    /// Unexpected failure
    Internal,
}

/// BotBrawl error types
#[derive(Debug, Clone, Error)]
pub enum BrawlError {
    // ========================================================================
    // Validation Errors
    // ========================================================================

    /// Invalid input field
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    /// Side is not part of the contest
    #[error("Side {side} is not part of this contest")]
    InvalidSide { side: String },

    /// Stake below the pool minimum
    #[error("Stake of {amount} is below the minimum of {minimum}")]
    StakeTooSmall { amount: u64, minimum: u64 },

    /// Challenge target cannot be matched
    #[error("Invalid challenge target: {reason}")]
    InvalidTarget { reason: String },

    /// Chess move rejected by the rules engine
    #[error("Illegal move {mv}")]
    IllegalMove { mv: String },

    // ========================================================================
    // Auth Errors
    // ========================================================================

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    // ========================================================================
    // State Conflicts
    // ========================================================================

    /// Pool no longer accepts stakes
    #[error("Pool {pool_id} is closed")]
    PoolClosed { pool_id: String },

    /// Battle phase forbids the operation
    #[error("Battle {battle_id} is {phase}")]
    BattleClosed { battle_id: String, phase: String },

    /// Agent already waiting in the queue for this kind
    #[error("Agent {agent_id} is already queued for {kind}")]
    AlreadyQueued { agent_id: String, kind: String },

    /// Voter already voted on this battle
    #[error("Already voted on battle {battle_id}")]
    AlreadyVoted { battle_id: String },

    /// Move submitted out of turn
    #[error("It is not {agent_id}'s turn")]
    NotYourTurn { agent_id: String },

    // ========================================================================
    // Resource Errors
    // ========================================================================

    #[error("Insufficient funds in account {account}: requested {requested}, available {available}")]
    InsufficientFunds {
        account: String,
        requested: u64,
        available: u64,
    },

    #[error("Agent {agent_id} is inactive")]
    AgentInactive { agent_id: String },

    // ========================================================================
    // Lookup Errors
    // ========================================================================

    #[error("{resource} {id} not found")]
    NotFound { resource: String, id: String },

    // ========================================================================
    // Throttling
    // ========================================================================

    #[error("Rate limit exceeded: retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    // ========================================================================
    // Dependency Errors
    // ========================================================================

    #[error("{service} failed: {reason}")]
    DependencyFailed { service: String, reason: String },

    #[error("{service} timed out")]
    DependencyTimeout { service: String },

    // ========================================================================
    // General Errors
    // ========================================================================

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BrawlError {
    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidInput { .. }
            | Self::InvalidSide { .. }
            | Self::StakeTooSmall { .. }
            | Self::InvalidTarget { .. }
            | Self::IllegalMove { .. } => ErrorClass::Validation,
            Self::Unauthenticated | Self::Forbidden { .. } => ErrorClass::Auth,
            Self::PoolClosed { .. }
            | Self::BattleClosed { .. }
            | Self::AlreadyQueued { .. }
            | Self::AlreadyVoted { .. }
            | Self::NotYourTurn { .. } => ErrorClass::StateConflict,
            Self::InsufficientFunds { .. } | Self::AgentInactive { .. } => ErrorClass::Resource,
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::RateLimitExceeded { .. } => ErrorClass::RateLimited,
            Self::DependencyFailed { .. } | Self::DependencyTimeout { .. } => {
                ErrorClass::Dependency
            }
            Self::Internal { .. } => ErrorClass::Internal,
        }
    }

    /// HTTP-style status for synchronous callers
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::Forbidden { .. } | Self::AgentInactive { .. } | Self::InsufficientFunds { .. } => 403,
            Self::DependencyTimeout { .. } => 504,
            Self::DependencyFailed { .. } => 502,
            _ => match self.class() {
                ErrorClass::Validation => 400,
                ErrorClass::StateConflict => 409,
                ErrorClass::NotFound => 404,
                ErrorClass::RateLimited => 429,
                _ => 500,
            },
        }
    }

    /// Check if retrying the same call later may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Dependency | ErrorClass::Internal | ErrorClass::RateLimited
        )
    }

    /// Get an error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::InvalidSide { .. } => "INVALID_SIDE",
            Self::StakeTooSmall { .. } => "STAKE_TOO_SMALL",
            Self::InvalidTarget { .. } => "INVALID_TARGET",
            Self::IllegalMove { .. } => "ILLEGAL_MOVE",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::PoolClosed { .. } => "POOL_CLOSED",
            Self::BattleClosed { .. } => "BATTLE_CLOSED",
            Self::AlreadyQueued { .. } => "ALREADY_QUEUED",
            Self::AlreadyVoted { .. } => "ALREADY_VOTED",
            Self::NotYourTurn { .. } => "NOT_YOUR_TURN",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::AgentInactive { .. } => "AGENT_INACTIVE",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Self::DependencyFailed { .. } => "DEPENDENCY_FAILED",
            Self::DependencyTimeout { .. } => "DEPENDENCY_TIMEOUT",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
