//! Pool records and the settlement arithmetic
//!
//! All amounts are whole units. Payout math floors at every step so the sum
//! paid out can never exceed what is distributable; the remainder stays with
//! the house.

use std::collections::BTreeMap;

use botbrawl_types::{BattleId, OwnerId, PoolId, Side, StakeId};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Pool lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Open,
    Settled,
}

/// A betting pool attached to one battle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetPool {
    pub id: PoolId,
    pub battle_id: BattleId,
    pub status: PoolStatus,
    /// Accumulated stake per side; every side of the contest has a key
    pub totals: BTreeMap<Side, u64>,
    pub winning_side: Option<Side>,
    pub rake_rate: Decimal,
    pub stake_count: usize,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl BetPool {
    pub fn new(battle_id: BattleId, sides: &[Side], rake_rate: Decimal) -> Self {
        Self {
            id: PoolId::new(),
            battle_id,
            status: PoolStatus::Open,
            totals: sides.iter().map(|side| (*side, 0)).collect(),
            winning_side: None,
            rake_rate,
            stake_count: 0,
            created_at: Utc::now(),
            settled_at: None,
        }
    }

    pub fn total(&self) -> u64 {
        self.totals.values().sum()
    }

    pub fn side_total(&self, side: Side) -> Option<u64> {
        self.totals.get(&side).copied()
    }

    pub fn has_side(&self, side: Side) -> bool {
        self.totals.contains_key(&side)
    }

    pub fn is_open(&self) -> bool {
        self.status == PoolStatus::Open
    }

    /// Live odds for every side
    pub fn odds(&self) -> PoolOdds {
        let total = self.total();
        let side_count = self.totals.len().max(1);
        let sides = self
            .totals
            .iter()
            .map(|(side, side_total)| {
                let percentage = if total == 0 {
                    Decimal::ONE_HUNDRED / Decimal::from(side_count as u64)
                } else {
                    Decimal::from(*side_total) * Decimal::ONE_HUNDRED / Decimal::from(total)
                };
                let multiplier = if *side_total == 0 {
                    None
                } else {
                    Some(Decimal::from(total) / Decimal::from(*side_total))
                };
                SideOdds {
                    side: *side,
                    total: *side_total,
                    percentage: percentage.round_dp(2),
                    multiplier: multiplier.map(|m| m.round_dp(2)),
                }
            })
            .collect();

        PoolOdds {
            pool_id: self.id,
            status: self.status,
            total,
            sides,
        }
    }
}

/// A single wager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stake {
    pub id: StakeId,
    pub pool_id: PoolId,
    pub bettor: OwnerId,
    pub side: Side,
    pub amount: u64,
    /// Written exactly once at settlement
    pub payout: Option<u64>,
    pub placed_at: DateTime<Utc>,
}

/// Odds for one side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideOdds {
    pub side: Side,
    pub total: u64,
    /// Share of the pool on this side, 0-100
    pub percentage: Decimal,
    /// Gross payout multiplier; `None` while nobody backs the side
    pub multiplier: Option<Decimal>,
}

/// Odds for a whole pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolOdds {
    pub pool_id: PoolId,
    pub status: PoolStatus,
    pub total: u64,
    pub sides: Vec<SideOdds>,
}

/// Result of settling a pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub pool_id: PoolId,
    pub winning_side: Option<Side>,
    pub total_pool: u64,
    pub rake: u64,
    pub distributable: u64,
    pub paid_out: u64,
    /// Rake plus rounding remainder
    pub house_take: u64,
    /// Every stake returned in full (draw, abort, or unbacked winner)
    pub refunded: bool,
    pub stakes_settled: usize,
}

/// `floor(total * rate)`
pub fn compute_rake(total: u64, rate: Decimal) -> u64 {
    (Decimal::from(total) * rate)
        .floor()
        .to_u64()
        .unwrap_or(0)
        .min(total)
}

/// `floor(distributable * amount / winning_total)`
pub fn proportional_payout(distributable: u64, amount: u64, winning_total: u64) -> u64 {
    if winning_total == 0 {
        return 0;
    }
    ((distributable as u128 * amount as u128) / winning_total as u128) as u64
}
