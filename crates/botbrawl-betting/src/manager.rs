//! Pool manager: stake placement and settlement
//!
//! Each pool sits behind its own async mutex. Placing a stake and settling
//! the pool both take that mutex, so settlement always sees a stable set of
//! stakes and a settled pool can never accept another one.

use std::collections::HashMap;
use std::sync::Arc;

use botbrawl_ledger::{Balance, Ledger};
use botbrawl_types::{BattleId, BettingConfig, OwnerId, PoolId, Side, StakeId};
use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::pool::{
    compute_rake, proportional_payout, BetPool, PoolOdds, PoolStatus, SettlementSummary, Stake,
};
use crate::{BettingError, Result};

struct PoolState {
    pool: BetPool,
    stakes: Vec<Stake>,
    summary: Option<SettlementSummary>,
}

/// Returned to a bettor after a successful stake
#[derive(Debug, Clone, serde::Serialize)]
pub struct StakeReceipt {
    pub stake: Stake,
    pub balance: Balance,
}

/// Owns every betting pool and moves funds through the ledger
pub struct PoolManager {
    ledger: Ledger,
    config: BettingConfig,
    pools: RwLock<HashMap<PoolId, Arc<Mutex<PoolState>>>>,
    by_battle: RwLock<HashMap<BattleId, PoolId>>,
}

impl PoolManager {
    pub fn new(ledger: Ledger, config: BettingConfig) -> Self {
        Self {
            ledger,
            config,
            pools: RwLock::new(HashMap::new()),
            by_battle: RwLock::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn config(&self) -> &BettingConfig {
        &self.config
    }

    /// Open the pool for a battle
    ///
    /// Opening twice for the same battle returns the existing pool.
    pub async fn open_pool(&self, battle_id: BattleId, sides: &[Side]) -> Result<BetPool> {
        if sides.len() < 2 {
            return Err(BettingError::InvalidSides { count: sides.len() });
        }

        let existing = {
            let mut by_battle = self.by_battle.write();
            match by_battle.get(&battle_id) {
                Some(pool_id) => *pool_id,
                None => {
                    let pool = BetPool::new(battle_id, sides, self.config.rake_rate);
                    by_battle.insert(battle_id, pool.id);
                    self.pools.write().insert(
                        pool.id,
                        Arc::new(Mutex::new(PoolState {
                            pool: pool.clone(),
                            stakes: Vec::new(),
                            summary: None,
                        })),
                    );
                    info!(pool_id = %pool.id, battle_id = %battle_id, sides = sides.len(), "Betting pool opened");
                    return Ok(pool);
                }
            }
        };

        self.pool(&existing).await
    }

    fn state(&self, pool_id: &PoolId) -> Result<Arc<Mutex<PoolState>>> {
        self.pools
            .read()
            .get(pool_id)
            .cloned()
            .ok_or(BettingError::PoolNotFound { pool_id: *pool_id })
    }

    /// Place a stake: lock funds, record the stake, bump the side total
    pub async fn place_stake(
        &self,
        pool_id: &PoolId,
        bettor: &OwnerId,
        side: Side,
        amount: u64,
    ) -> Result<StakeReceipt> {
        let state = self.state(pool_id)?;
        let mut state = state.lock().await;

        if !state.pool.is_open() {
            return Err(BettingError::PoolClosed { pool_id: *pool_id });
        }
        if !state.pool.has_side(side) {
            return Err(BettingError::InvalidSide { side });
        }
        if amount < self.config.min_stake {
            return Err(BettingError::StakeTooSmall {
                amount,
                minimum: self.config.min_stake,
            });
        }

        let stake_id = StakeId::new();
        let balance = self
            .ledger
            .lock(bettor, amount, &stake_id.to_string())
            .await?;

        let stake = Stake {
            id: stake_id,
            pool_id: *pool_id,
            bettor: *bettor,
            side,
            amount,
            payout: None,
            placed_at: Utc::now(),
        };
        state.stakes.push(stake.clone());
        *state.pool.totals.entry(side).or_insert(0) += amount;
        state.pool.stake_count += 1;

        debug!(pool_id = %pool_id, stake_id = %stake.id, side = %side, amount, "Stake placed");
        Ok(StakeReceipt { stake, balance })
    }

    /// Settle a pool against the winning side; `None` refunds everyone
    ///
    /// Settling an already settled pool returns the original summary without
    /// touching any balance. If a ledger write fails mid-way the pool stays
    /// open; stakes already paid keep their payout and are skipped on retry.
    pub async fn settle(&self, pool_id: &PoolId, winning_side: Option<Side>) -> Result<SettlementSummary> {
        let state = self.state(pool_id)?;
        let mut state = state.lock().await;

        if let Some(summary) = &state.summary {
            debug!(pool_id = %pool_id, "Pool already settled");
            return Ok(summary.clone());
        }
        if let Some(side) = winning_side {
            if !state.pool.has_side(side) {
                return Err(BettingError::InvalidSide { side });
            }
        }

        let total_pool = state.pool.total();
        let winning_total = winning_side
            .and_then(|side| state.pool.side_total(side))
            .unwrap_or(0);
        let refunded = winning_side.is_none() || winning_total == 0;

        let (rake, distributable) = if refunded {
            (0, total_pool)
        } else {
            let rake = compute_rake(total_pool, state.pool.rake_rate);
            (rake, total_pool - rake)
        };

        let mut paid_out = 0u64;
        for stake in state.stakes.iter_mut() {
            let payout = if refunded {
                stake.amount
            } else if Some(stake.side) == winning_side {
                proportional_payout(distributable, stake.amount, winning_total)
            } else {
                0
            };

            if stake.payout.is_none() {
                self.ledger
                    .settle_lock(&stake.bettor, stake.amount, payout, &stake.id.to_string())
                    .await?;
                stake.payout = Some(payout);
            }
            paid_out += stake.payout.unwrap_or(payout);
        }

        let summary = SettlementSummary {
            pool_id: *pool_id,
            winning_side: if refunded { None } else { winning_side },
            total_pool,
            rake,
            distributable,
            paid_out,
            house_take: total_pool - paid_out,
            refunded,
            stakes_settled: state.stakes.len(),
        };

        state.pool.status = PoolStatus::Settled;
        state.pool.winning_side = summary.winning_side;
        state.pool.settled_at = Some(Utc::now());
        state.summary = Some(summary.clone());

        info!(
            pool_id = %pool_id,
            winning_side = ?summary.winning_side,
            total_pool,
            rake,
            paid_out,
            refunded,
            "Betting pool settled"
        );
        Ok(summary)
    }

    /// Return every stake in full (battle aborted)
    pub async fn refund(&self, pool_id: &PoolId) -> Result<SettlementSummary> {
        self.settle(pool_id, None).await
    }

    pub async fn pool(&self, pool_id: &PoolId) -> Result<BetPool> {
        let state = self.state(pool_id)?;
        let state = state.lock().await;
        Ok(state.pool.clone())
    }

    pub fn pool_id_for_battle(&self, battle_id: &BattleId) -> Option<PoolId> {
        self.by_battle.read().get(battle_id).copied()
    }

    pub async fn pool_for_battle(&self, battle_id: &BattleId) -> Result<BetPool> {
        let pool_id = self
            .pool_id_for_battle(battle_id)
            .ok_or(BettingError::NoPoolForBattle { battle_id: *battle_id })?;
        self.pool(&pool_id).await
    }

    pub async fn odds(&self, pool_id: &PoolId) -> Result<PoolOdds> {
        Ok(self.pool(pool_id).await?.odds())
    }

    pub async fn stakes(&self, pool_id: &PoolId) -> Result<Vec<Stake>> {
        let state = self.state(pool_id)?;
        let state = state.lock().await;
        Ok(state.stakes.clone())
    }

    pub async fn summary(&self, pool_id: &PoolId) -> Result<Option<SettlementSummary>> {
        let state = self.state(pool_id)?;
        let state = state.lock().await;
        Ok(state.summary.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn manager() -> PoolManager {
        PoolManager::new(
            Ledger::new(),
            BettingConfig {
                rake_rate: dec!(0.05),
                min_stake: 10,
            },
        )
    }

    async fn bettor(manager: &PoolManager, funds: u64) -> OwnerId {
        let owner = OwnerId::new();
        manager.ledger().deposit(&owner, funds, "faucet").await.unwrap();
        owner
    }

    #[tokio::test]
    async fn test_open_pool_is_idempotent_per_battle() {
        let manager = manager();
        let battle = BattleId::new();
        let first = manager.open_pool(battle, &[Side::A, Side::B]).await.unwrap();
        let second = manager.open_pool(battle, &[Side::A, Side::B]).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_open_pool_needs_two_sides() {
        let manager = manager();
        let result = manager.open_pool(BattleId::new(), &[Side::A]).await;
        assert!(matches!(result, Err(BettingError::InvalidSides { count: 1 })));
    }

    #[tokio::test]
    async fn test_place_stake_locks_funds() {
        let manager = manager();
        let pool = manager.open_pool(BattleId::new(), &[Side::A, Side::B]).await.unwrap();
        let alice = bettor(&manager, 500).await;

        let receipt = manager.place_stake(&pool.id, &alice, Side::A, 100).await.unwrap();
        assert_eq!(receipt.balance.available, 400);
        assert_eq!(receipt.balance.locked, 100);

        let pool = manager.pool(&pool.id).await.unwrap();
        assert_eq!(pool.side_total(Side::A), Some(100));
        assert_eq!(pool.stake_count, 1);
    }

    #[tokio::test]
    async fn test_place_stake_rejections() {
        let manager = manager();
        let pool = manager.open_pool(BattleId::new(), &[Side::A, Side::B]).await.unwrap();
        let alice = bettor(&manager, 50).await;

        let result = manager.place_stake(&pool.id, &alice, Side::C, 20).await;
        assert!(matches!(result, Err(BettingError::InvalidSide { side: Side::C })));

        let result = manager.place_stake(&pool.id, &alice, Side::A, 5).await;
        assert!(matches!(result, Err(BettingError::StakeTooSmall { .. })));

        let result = manager.place_stake(&pool.id, &alice, Side::A, 80).await;
        assert!(matches!(result, Err(BettingError::Ledger(_))));

        // Nothing was recorded by the failed attempts
        let pool = manager.pool(&pool.id).await.unwrap();
        assert_eq!(pool.total(), 0);
        assert_eq!(manager.ledger().balance(&alice).await.available, 50);
    }

    #[tokio::test]
    async fn test_settle_with_five_percent_rake() {
        let manager = manager();
        let pool = manager.open_pool(BattleId::new(), &[Side::A, Side::B]).await.unwrap();
        let alice = bettor(&manager, 500).await;
        let bob = bettor(&manager, 500).await;

        manager.place_stake(&pool.id, &alice, Side::A, 100).await.unwrap();
        manager.place_stake(&pool.id, &bob, Side::B, 50).await.unwrap();

        let summary = manager.settle(&pool.id, Some(Side::A)).await.unwrap();
        assert_eq!(summary.total_pool, 150);
        assert_eq!(summary.rake, 7);
        assert_eq!(summary.distributable, 143);
        assert_eq!(summary.paid_out, 143);
        assert!(!summary.refunded);

        let alice_balance = manager.ledger().balance(&alice).await;
        assert_eq!(alice_balance.available, 543);
        assert_eq!(alice_balance.locked, 0);

        let bob_balance = manager.ledger().balance(&bob).await;
        assert_eq!(bob_balance.available, 450);
        assert_eq!(bob_balance.locked, 0);

        let stakes = manager.stakes(&pool.id).await.unwrap();
        let payouts: Vec<_> = stakes.iter().map(|s| s.payout).collect();
        assert_eq!(payouts, vec![Some(143), Some(0)]);
    }

    #[tokio::test]
    async fn test_settle_is_idempotent() {
        let manager = manager();
        let pool = manager.open_pool(BattleId::new(), &[Side::A, Side::B]).await.unwrap();
        let alice = bettor(&manager, 500).await;
        let bob = bettor(&manager, 500).await;
        manager.place_stake(&pool.id, &alice, Side::A, 100).await.unwrap();
        manager.place_stake(&pool.id, &bob, Side::B, 50).await.unwrap();

        let first = manager.settle(&pool.id, Some(Side::A)).await.unwrap();
        let second = manager.settle(&pool.id, Some(Side::A)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(manager.ledger().balance(&alice).await.available, 543);
    }

    #[tokio::test]
    async fn test_draw_refunds_exactly_with_no_rake() {
        let manager = manager();
        let pool = manager.open_pool(BattleId::new(), &[Side::A, Side::B]).await.unwrap();
        let alice = bettor(&manager, 500).await;
        let bob = bettor(&manager, 300).await;
        manager.place_stake(&pool.id, &alice, Side::A, 120).await.unwrap();
        manager.place_stake(&pool.id, &bob, Side::B, 75).await.unwrap();

        let summary = manager.settle(&pool.id, None).await.unwrap();
        assert!(summary.refunded);
        assert_eq!(summary.rake, 0);
        assert_eq!(summary.paid_out, 195);

        assert_eq!(manager.ledger().balance(&alice).await.available, 500);
        assert_eq!(manager.ledger().balance(&bob).await.available, 300);
        let stakes = manager.stakes(&pool.id).await.unwrap();
        assert!(stakes.iter().all(|s| s.payout == Some(s.amount)));
    }

    #[tokio::test]
    async fn test_unbacked_winner_refunds() {
        let manager = manager();
        let pool = manager.open_pool(BattleId::new(), &[Side::A, Side::B]).await.unwrap();
        let bob = bettor(&manager, 300).await;
        manager.place_stake(&pool.id, &bob, Side::B, 75).await.unwrap();

        let summary = manager.settle(&pool.id, Some(Side::A)).await.unwrap();
        assert!(summary.refunded);
        assert_eq!(summary.winning_side, None);
        assert_eq!(manager.ledger().balance(&bob).await.available, 300);
    }

    #[tokio::test]
    async fn test_payouts_respect_distributable() {
        let manager = manager();
        let pool = manager
            .open_pool(BattleId::new(), &[Side::A, Side::B, Side::C])
            .await
            .unwrap();

        let mut bettors = Vec::new();
        for (side, amount) in [(Side::A, 33), (Side::A, 17), (Side::B, 41), (Side::C, 29), (Side::A, 11)] {
            let owner = bettor(&manager, 100).await;
            manager.place_stake(&pool.id, &owner, side, amount).await.unwrap();
            bettors.push(owner);
        }

        let summary = manager.settle(&pool.id, Some(Side::A)).await.unwrap();
        assert_eq!(summary.total_pool, 131);
        assert_eq!(summary.rake, 6);
        assert!(summary.paid_out <= summary.total_pool - summary.rake);
        assert_eq!(summary.house_take, summary.total_pool - summary.paid_out);
    }

    #[tokio::test]
    async fn test_settled_pool_rejects_stakes() {
        let manager = manager();
        let pool = manager.open_pool(BattleId::new(), &[Side::A, Side::B]).await.unwrap();
        let alice = bettor(&manager, 500).await;
        manager.settle(&pool.id, None).await.unwrap();

        let result = manager.place_stake(&pool.id, &alice, Side::A, 100).await;
        assert!(matches!(result, Err(BettingError::PoolClosed { .. })));
        assert_eq!(manager.ledger().balance(&alice).await.available, 500);
    }

    #[tokio::test]
    async fn test_concurrent_stakes_and_settlement_lose_nothing() {
        let manager = Arc::new(manager());
        let pool_id = manager.open_pool(BattleId::new(), &[Side::A, Side::B]).await.unwrap().id;

        let mut owners = Vec::new();
        for _ in 0..20 {
            owners.push(bettor(&manager, 100).await);
        }

        let mut tasks = Vec::new();
        for (i, owner) in owners.iter().enumerate() {
            let manager = manager.clone();
            let owner = *owner;
            let side = if i % 2 == 0 { Side::A } else { Side::B };
            tasks.push(tokio::spawn(async move {
                manager.place_stake(&pool_id, &owner, side, 50).await
            }));
        }
        let settle = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.settle(&pool_id, Some(Side::A)).await })
        };

        let results = futures::future::join_all(tasks).await;
        let summary = settle.await.unwrap().unwrap();

        let accepted = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        assert_eq!(summary.stakes_settled, accepted);

        // Every accepted stake was settled; nobody is left with locked funds
        for owner in &owners {
            assert_eq!(manager.ledger().balance(owner).await.locked, 0);
        }
    }
}
