//! BotBrawl Rating - Elo calculations for agent battles
//!
//! Pure functions only: no I/O, no shared state. Callers read the current
//! ratings, ask for deltas, and apply them once per settled contest.
//!
//! - [`pairwise`]: classic two-player Elo
//! - [`three_way`]: three-player Elo where each player's expectation is the
//!   average of its two pairwise expectations
//! - [`ArenaStat`]: per (agent, arena kind) record that deltas are applied to

mod stat;

pub use stat::{ArenaStat, Outcome};

/// Default K-factor for rating updates (higher = more volatile)
pub const K_FACTOR: f64 = 32.0;

/// Rating of an agent that has never fought in an arena kind
pub const DEFAULT_RATING: i32 = 1200;

/// Expected score of a player rated `rating` against `opponent`
///
/// Logistic curve on a 400-point scale: equal ratings give 0.5.
pub fn expected_score(rating: i32, opponent: i32) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((opponent - rating) as f64 / 400.0))
}

/// Rating deltas for a two-player contest
///
/// `score_a` is A's actual score (1 win, 0.5 draw, 0 loss); B scores
/// `1 - score_a`. Each delta is rounded from its own expectation, so the pair
/// is not forced to sum to zero.
pub fn pairwise(rating_a: i32, rating_b: i32, score_a: f64, k: f64) -> (i32, i32) {
    let score_a = score_a.clamp(0.0, 1.0);
    let score_b = 1.0 - score_a;

    let expected_a = expected_score(rating_a, rating_b);
    let expected_b = expected_score(rating_b, rating_a);

    (
        round_delta(k * (score_a - expected_a)),
        round_delta(k * (score_b - expected_b)),
    )
}

/// Rating deltas for a three-player contest
///
/// `scores[i]` is player i's raw score in `[0, 2]`: 1 for each opponent it
/// beat, 0.5 for each tie, 0 for each loss. It is halved before being compared
/// to the player's expectation, which is the mean of its two pairwise
/// expectations.
pub fn three_way(ratings: [i32; 3], scores: [f64; 3], k: f64) -> [i32; 3] {
    let mut deltas = [0; 3];
    for i in 0..3 {
        let expected = (0..3)
            .filter(|&j| j != i)
            .map(|j| expected_score(ratings[i], ratings[j]))
            .sum::<f64>()
            / 2.0;
        let actual = scores[i].clamp(0.0, 2.0) / 2.0;
        deltas[i] = round_delta(k * (actual - expected));
    }
    deltas
}

/// Raw three-way scores from per-player vote counts
///
/// Every pair is compared head to head: more votes beats fewer, equal counts
/// tie. A strict ranking yields `[2.0, 1.0, 0.0]` in rank order.
pub fn scores_from_tally(votes: [u32; 3]) -> [f64; 3] {
    let mut scores = [0.0; 3];
    for i in 0..3 {
        for j in 0..3 {
            if i == j {
                continue;
            }
            scores[i] += match votes[i].cmp(&votes[j]) {
                std::cmp::Ordering::Greater => 1.0,
                std::cmp::Ordering::Equal => 0.5,
                std::cmp::Ordering::Less => 0.0,
            };
        }
    }
    scores
}

fn round_delta(value: f64) -> i32 {
    value.round() as i32
}
