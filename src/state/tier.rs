use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::scenario::Difficulty;

/// Points needed to climb one tier level in the built-in progression.
const POINTS_PER_LEVEL: i64 = 500;

/// Coarse skill bracket used to pair opponents of comparable rank.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RankTier {
    #[serde(rename = "bronze_1")]
    Bronze1,
    #[serde(rename = "bronze_2")]
    Bronze2,
    #[serde(rename = "bronze_3")]
    Bronze3,
    #[serde(rename = "silver_1")]
    Silver1,
    #[serde(rename = "silver_2")]
    Silver2,
    #[serde(rename = "silver_3")]
    Silver3,
    #[serde(rename = "gold_1")]
    Gold1,
    #[serde(rename = "gold_2")]
    Gold2,
    #[serde(rename = "gold_3")]
    Gold3,
    Master,
}

const ALL_TIERS: [RankTier; 10] = [
    RankTier::Bronze1,
    RankTier::Bronze2,
    RankTier::Bronze3,
    RankTier::Silver1,
    RankTier::Silver2,
    RankTier::Silver3,
    RankTier::Gold1,
    RankTier::Gold2,
    RankTier::Gold3,
    RankTier::Master,
];

impl RankTier {
    /// Ordinal level of the tier, starting at 1 for `bronze_1`.
    pub fn level(self) -> u8 {
        match self {
            RankTier::Bronze1 => 1,
            RankTier::Bronze2 => 2,
            RankTier::Bronze3 => 3,
            RankTier::Silver1 => 4,
            RankTier::Silver2 => 5,
            RankTier::Silver3 => 6,
            RankTier::Gold1 => 7,
            RankTier::Gold2 => 8,
            RankTier::Gold3 => 9,
            RankTier::Master => 10,
        }
    }

    /// Number of levels separating two tiers.
    pub fn distance(self, other: RankTier) -> u8 {
        self.level().abs_diff(other.level())
    }

    /// Tier reached with the given amount of accumulated points.
    pub fn from_points(points: i64) -> Self {
        let index = (points.max(0) / POINTS_PER_LEVEL).min(ALL_TIERS.len() as i64 - 1);
        ALL_TIERS[index as usize]
    }

    /// Scenario difficulty served to matches played at this tier.
    pub fn difficulty(self) -> Difficulty {
        match self.level() {
            1..=3 => Difficulty::Easy,
            4..=6 => Difficulty::Medium,
            _ => Difficulty::Hard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_follow_points_progression() {
        assert_eq!(RankTier::from_points(-40), RankTier::Bronze1);
        assert_eq!(RankTier::from_points(0), RankTier::Bronze1);
        assert_eq!(RankTier::from_points(499), RankTier::Bronze1);
        assert_eq!(RankTier::from_points(500), RankTier::Bronze2);
        assert_eq!(RankTier::from_points(3_200), RankTier::Gold1);
        assert_eq!(RankTier::from_points(4_500), RankTier::Master);
        assert_eq!(RankTier::from_points(90_000), RankTier::Master);
    }

    #[test]
    fn distance_is_symmetric() {
        assert_eq!(RankTier::Bronze2.distance(RankTier::Silver1), 2);
        assert_eq!(RankTier::Silver1.distance(RankTier::Bronze2), 2);
        assert_eq!(RankTier::Gold3.distance(RankTier::Gold3), 0);
    }

    #[test]
    fn tier_serializes_with_level_suffix() {
        let json = serde_json::to_string(&RankTier::Silver2).unwrap();
        assert_eq!(json, "\"silver_2\"");
        let tier: RankTier = serde_json::from_str("\"master\"").unwrap();
        assert_eq!(tier, RankTier::Master);
    }
}
