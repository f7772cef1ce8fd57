use serde::Serialize;
use uuid::Uuid;

use crate::state::{pvp_match::UserId, scoring::MatchOutcome, tier::RankTier};

/// Ranking snapshot the stats collaborator keeps per player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStats {
    pub user_id: UserId,
    pub total_points: i64,
    pub rank_tier: RankTier,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub win_streak: u32,
    pub best_win_streak: u32,
    /// Sum of ranking points gained from wins.
    pub points_won: i64,
    /// Sum of ranking points lost to defeats.
    pub points_lost: i64,
}

impl PlayerStats {
    /// Stats of a player who has never finished a match.
    pub fn newcomer(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            total_points: 0,
            rank_tier: RankTier::Bronze1,
            wins: 0,
            losses: 0,
            ties: 0,
            win_streak: 0,
            best_win_streak: 0,
            points_won: 0,
            points_lost: 0,
        }
    }
}

/// Final result reported for one player after a match completes.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeReport {
    pub user_id: UserId,
    pub match_id: Uuid,
    pub outcome: MatchOutcome,
    pub points_delta: i64,
}
