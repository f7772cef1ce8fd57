//! Round scoring and match reward policy.
//!
//! Both rule sets are plain data read from configuration; nothing in the match lifecycle
//! hardcodes these numbers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Per-round scoring constants.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
    /// Number of rounds in a match.
    pub total_rounds: u8,
    /// Length of the decision window in seconds; also the upper bound of a valid elapsed time.
    pub time_limit_secs: u32,
    /// Points for a correct decision regardless of speed.
    pub base_points: u32,
    /// Extra points for an instant correct decision, shrinking linearly to zero at the limit.
    pub speed_bonus_max: u32,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            total_rounds: 5,
            time_limit_secs: 15,
            base_points: 100,
            speed_bonus_max: 50,
        }
    }
}

impl ScoringRules {
    /// Points earned by one side of a round.
    ///
    /// Incorrect decisions earn nothing; correct ones earn the base plus
    /// `floor((limit - elapsed) / limit * bonus)`, never negative.
    pub fn round_points(&self, correct: bool, time_elapsed: f64) -> u32 {
        if !correct {
            return 0;
        }
        if self.time_limit_secs == 0 {
            return self.base_points;
        }

        let limit = f64::from(self.time_limit_secs);
        let remaining = (limit - time_elapsed).clamp(0.0, limit);
        // Multiply before dividing so exact values such as 12 * 50 / 15 stay exact.
        let bonus = (remaining * f64::from(self.speed_bonus_max) / limit).floor();
        self.base_points + bonus as u32
    }

    /// Whether an elapsed time falls inside the decision window.
    pub fn accepts_elapsed(&self, time_elapsed: f64) -> bool {
        time_elapsed.is_finite() && (0.0..=f64::from(self.time_limit_secs)).contains(&time_elapsed)
    }
}

/// Final result of a match from one player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MatchOutcome {
    Win,
    Loss,
    Tie,
}

/// Ranking points awarded when a match ends.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RewardRules {
    pub win_base: u32,
    /// A bonus step is granted for every `streak_step` consecutive wins, counting this one.
    pub streak_step: u32,
    pub streak_bonus: u32,
    pub loss_penalty: u32,
}

impl Default for RewardRules {
    fn default() -> Self {
        Self {
            win_base: 200,
            streak_step: 3,
            streak_bonus: 100,
            loss_penalty: 100,
        }
    }
}

impl RewardRules {
    /// Streak bonus for a win achieved while holding `current_streak` prior consecutive wins.
    pub fn streak_bonus_for(&self, current_streak: u32) -> u32 {
        if self.streak_step == 0 {
            return 0;
        }
        ((current_streak + 1) / self.streak_step) * self.streak_bonus
    }

    /// Signed ranking-points change for the given outcome.
    pub fn points_delta(&self, outcome: MatchOutcome, current_streak: u32) -> i64 {
        match outcome {
            MatchOutcome::Win => {
                i64::from(self.win_base) + i64::from(self.streak_bonus_for(current_streak))
            }
            MatchOutcome::Loss => -i64::from(self.loss_penalty),
            MatchOutcome::Tie => 0,
        }
    }
}
