//! Engine configuration
//!
//! Tunables shared by the engines and the orchestrator. Every field has a
//! serde default so a partial config file only overrides what it names.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrawlConfig {
    #[serde(default)]
    pub rating: RatingConfig,

    #[serde(default)]
    pub betting: BettingConfig,

    #[serde(default)]
    pub battle: BattleConfig,

    #[serde(default)]
    pub matchmaking: MatchmakingConfig,

    #[serde(default)]
    pub judge: JudgeConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Rating engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingConfig {
    /// K-factor for rating updates (higher = more volatile)
    #[serde(default = "default_k_factor")]
    pub k_factor: f64,

    /// Rating assigned to an agent's first battle in an arena kind
    #[serde(default = "default_rating")]
    pub default_rating: i32,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            k_factor: default_k_factor(),
            default_rating: default_rating(),
        }
    }
}

/// Betting pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BettingConfig {
    /// House share of every decided pool, taken before payouts
    #[serde(default = "default_rake_rate")]
    pub rake_rate: Decimal,

    /// Smallest accepted stake, in whole units
    #[serde(default = "default_min_stake")]
    pub min_stake: u64,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            rake_rate: default_rake_rate(),
            min_stake: default_min_stake(),
        }
    }
}

/// Battle lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleConfig {
    /// Length of the community voting window
    #[serde(default = "default_voting_window")]
    pub voting_window_secs: u64,

    /// How long a battle may wait for AI output before it is aborted
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    /// Close voting early once this many votes are in
    #[serde(default)]
    pub vote_quorum: Option<u32>,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            voting_window_secs: default_voting_window(),
            generation_timeout_secs: default_generation_timeout(),
            vote_quorum: None,
        }
    }
}

impl BattleConfig {
    pub fn voting_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.voting_window_secs as i64)
    }

    pub fn generation_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.generation_timeout_secs as i64)
    }
}

/// Matchmaking queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchmakingConfig {
    /// Lifetime of a waiting queue entry
    #[serde(default = "default_queue_ttl")]
    pub queue_ttl_secs: u64,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            queue_ttl_secs: default_queue_ttl(),
        }
    }
}

impl MatchmakingConfig {
    pub fn queue_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.queue_ttl_secs as i64)
    }
}

/// Judge panel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Number of judges on the panel
    #[serde(default = "default_panel_size")]
    pub panel_size: usize,

    /// Averages closer than this are a draw
    #[serde(default = "default_draw_threshold")]
    pub draw_threshold: f64,

    /// Per-judge call timeout
    #[serde(default = "default_judge_timeout")]
    pub call_timeout_secs: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            panel_size: default_panel_size(),
            draw_threshold: default_draw_threshold(),
            call_timeout_secs: default_judge_timeout(),
        }
    }
}

impl JudgeConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Tick and worker scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between orchestrator ticks
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Interval between generation worker drains
    #[serde(default = "default_worker_interval")]
    pub worker_interval_secs: u64,

    /// Attempts before a generation job is marked failed
    #[serde(default = "default_max_job_attempts")]
    pub max_job_attempts: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            worker_interval_secs: default_worker_interval(),
            max_job_attempts: default_max_job_attempts(),
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn worker_interval(&self) -> Duration {
        Duration::from_secs(self.worker_interval_secs)
    }
}

// =============================================================================
// Default Functions
// =============================================================================

fn default_k_factor() -> f64 {
    32.0
}

fn default_rating() -> i32 {
    1200
}

fn default_rake_rate() -> Decimal {
    dec!(0.05)
}

fn default_min_stake() -> u64 {
    10
}

fn default_voting_window() -> u64 {
    300 // 5 minutes
}

fn default_generation_timeout() -> u64 {
    600 // 10 minutes
}

fn default_queue_ttl() -> u64 {
    3600 // 1 hour
}

fn default_panel_size() -> usize {
    3
}

fn default_draw_threshold() -> f64 {
    0.1
}

fn default_judge_timeout() -> u64 {
    45
}

fn default_tick_interval() -> u64 {
    300
}

fn default_worker_interval() -> u64 {
    5
}

fn default_max_job_attempts() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrawlConfig::default();
        assert_eq!(config.rating.default_rating, 1200);
        assert_eq!(config.betting.rake_rate, dec!(0.05));
        assert_eq!(config.battle.voting_window_secs, 300);
        assert_eq!(config.matchmaking.queue_ttl_secs, 3600);
        assert_eq!(config.judge.panel_size, 3);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: BrawlConfig =
            serde_json::from_str(r#"{"betting": {"min_stake": 25}}"#).unwrap();
        assert_eq!(config.betting.min_stake, 25);
        assert_eq!(config.betting.rake_rate, dec!(0.05));
        assert_eq!(config.rating.k_factor, 32.0);
    }
}
