//! BotBrawl Betting - Pari-mutuel pools on battle outcomes
//!
//! Spectators stake funds on a side of a battle. When the battle resolves,
//! the pool is settled:
//!
//! ```text
//! rake         = floor(total * rake_rate)
//! distributable = total - rake
//! payout(stake) = floor(distributable * stake / winning_side_total)
//! ```
//!
//! A draw, an abort, or a winner nobody backed refunds every stake in full
//! with no rake. Funds move only through the [`botbrawl_ledger::Ledger`]:
//! a stake locks funds, settlement consumes the lock and credits the payout.

mod manager;
mod pool;

pub use manager::{PoolManager, StakeReceipt};
pub use pool::{
    compute_rake, proportional_payout, BetPool, PoolOdds, PoolStatus, SettlementSummary, SideOdds,
    Stake,
};

use botbrawl_ledger::LedgerError;
use botbrawl_types::{BattleId, BrawlError, PoolId, Side};
use thiserror::Error;

/// Errors from pool operations
#[derive(Error, Debug, Clone)]
pub enum BettingError {
    #[error("Pool not found: {pool_id}")]
    PoolNotFound { pool_id: PoolId },

    #[error("No pool for battle {battle_id}")]
    NoPoolForBattle { battle_id: BattleId },

    #[error("Pool {pool_id} is closed")]
    PoolClosed { pool_id: PoolId },

    #[error("Side {side} is not part of this pool")]
    InvalidSide { side: Side },

    #[error("A pool needs at least two sides, got {count}")]
    InvalidSides { count: usize },

    #[error("Stake {amount} below minimum {minimum}")]
    StakeTooSmall { amount: u64, minimum: u64 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type Result<T> = std::result::Result<T, BettingError>;

impl From<BettingError> for BrawlError {
    fn from(err: BettingError) -> Self {
        match err {
            BettingError::PoolNotFound { pool_id } => BrawlError::not_found("Pool", pool_id),
            BettingError::NoPoolForBattle { battle_id } => {
                BrawlError::not_found("Pool for battle", battle_id)
            }
            BettingError::PoolClosed { pool_id } => BrawlError::PoolClosed {
                pool_id: pool_id.to_string(),
            },
            BettingError::InvalidSide { side } => BrawlError::InvalidSide {
                side: side.to_string(),
            },
            BettingError::InvalidSides { count } => {
                BrawlError::invalid_input("sides", format!("need at least two, got {}", count))
            }
            BettingError::StakeTooSmall { amount, minimum } => {
                BrawlError::StakeTooSmall { amount, minimum }
            }
            BettingError::Ledger(err) => err.into(),
        }
    }
}
