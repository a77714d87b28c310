//! Per (agent, arena kind) rating record

use serde::{Deserialize, Serialize};

/// Result of a contest from one agent's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

/// Rating and record of one agent in one arena kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaStat {
    pub rating: i32,
    /// Highest rating ever held; never below `rating`
    pub peak_rating: i32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    /// Positive for a win streak, negative for a loss streak, 0 after a draw
    pub streak: i32,
}

impl ArenaStat {
    pub fn new(initial_rating: i32) -> Self {
        Self {
            rating: initial_rating,
            peak_rating: initial_rating,
            wins: 0,
            losses: 0,
            draws: 0,
            streak: 0,
        }
    }

    pub fn battles(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    /// Fraction of battles won (0 with no battles)
    pub fn win_rate(&self) -> f64 {
        match self.battles() {
            0 => 0.0,
            n => self.wins as f64 / n as f64,
        }
    }

    /// Apply one settled contest
    pub fn apply(&mut self, delta: i32, outcome: Outcome) {
        self.rating += delta;
        self.peak_rating = self.peak_rating.max(self.rating);

        match outcome {
            Outcome::Win => {
                self.wins += 1;
                self.streak = if self.streak > 0 { self.streak + 1 } else { 1 };
            }
            Outcome::Loss => {
                self.losses += 1;
                self.streak = if self.streak < 0 { self.streak - 1 } else { -1 };
            }
            Outcome::Draw => {
                self.draws += 1;
                self.streak = 0;
            }
        }
    }
}

impl Default for ArenaStat {
    fn default() -> Self {
        Self::new(crate::DEFAULT_RATING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_tracks_highest_rating() {
        let mut stat = ArenaStat::default();
        stat.apply(16, Outcome::Win);
        stat.apply(-30, Outcome::Loss);

        assert_eq!(stat.rating, 1186);
        assert_eq!(stat.peak_rating, 1216);
        assert!(stat.peak_rating >= stat.rating);
    }

    #[test]
    fn test_streaks() {
        let mut stat = ArenaStat::default();
        stat.apply(10, Outcome::Win);
        stat.apply(10, Outcome::Win);
        assert_eq!(stat.streak, 2);

        stat.apply(-10, Outcome::Loss);
        assert_eq!(stat.streak, -1);
        stat.apply(-10, Outcome::Loss);
        assert_eq!(stat.streak, -2);

        stat.apply(0, Outcome::Draw);
        assert_eq!(stat.streak, 0);
        assert_eq!(stat.battles(), 5);
    }

    #[test]
    fn test_win_rate() {
        let mut stat = ArenaStat::default();
        assert_eq!(stat.win_rate(), 0.0);
        stat.apply(5, Outcome::Win);
        stat.apply(-5, Outcome::Loss);
        assert!((stat.win_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_serializes_outcome_snake_case() {
        assert_eq!(serde_json::to_string(&Outcome::Draw).unwrap(), "\"draw\"");
    }
}
