use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use futures::future::{BoxFuture, FutureExt};
use uuid::Uuid;

use crate::{
    dao::{
        models::{OutcomeReport, PlayerStats},
        storage::{StorageError, StorageResult},
    },
    state::{pvp_match::UserId, scoring::MatchOutcome, tier::RankTier},
};

/// Abstraction over the ranking collaborator that owns win streaks and tiers.
pub trait StatsStore: Send + Sync {
    /// Current stats of a player; unknown players read as newcomers.
    fn player_stats(&self, user_id: &str) -> BoxFuture<'static, StorageResult<PlayerStats>>;
    /// Apply a finished match to a player's stats, returning the updated snapshot.
    /// A second report for the same match and player is rejected.
    fn record_outcome(&self, report: OutcomeReport)
    -> BoxFuture<'static, StorageResult<PlayerStats>>;
}

/// Process-local stats store.
#[derive(Default, Clone)]
pub struct InMemoryStatsStore {
    stats: Arc<DashMap<UserId, PlayerStats>>,
    recorded: Arc<DashSet<(UserId, Uuid)>>,
}

impl InMemoryStatsStore {
    /// Empty store; everyone starts as a newcomer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a player's stats, e.g. to import an existing ranking.
    pub fn seed(&self, stats: PlayerStats) {
        self.stats.insert(stats.user_id.clone(), stats);
    }
}

/// Fold one outcome into a stats snapshot.
fn apply_outcome(stats: &mut PlayerStats, report: &OutcomeReport) {
    match report.outcome {
        MatchOutcome::Win => {
            stats.wins += 1;
            stats.win_streak += 1;
            stats.best_win_streak = stats.best_win_streak.max(stats.win_streak);
        }
        MatchOutcome::Loss => {
            stats.losses += 1;
            stats.win_streak = 0;
        }
        MatchOutcome::Tie => stats.ties += 1,
    }

    if report.points_delta >= 0 {
        stats.points_won += report.points_delta;
    } else {
        stats.points_lost += -report.points_delta;
    }
    stats.total_points = (stats.total_points + report.points_delta).max(0);
    stats.rank_tier = RankTier::from_points(stats.total_points);
}

impl StatsStore for InMemoryStatsStore {
    fn player_stats(&self, user_id: &str) -> BoxFuture<'static, StorageResult<PlayerStats>> {
        let snapshot = self
            .stats
            .get(user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| PlayerStats::newcomer(user_id));
        async move { Ok(snapshot) }.boxed()
    }

    fn record_outcome(
        &self,
        report: OutcomeReport,
    ) -> BoxFuture<'static, StorageResult<PlayerStats>> {
        let stats = self.stats.clone();
        let recorded = self.recorded.clone();
        async move {
            if !recorded.insert((report.user_id.clone(), report.match_id)) {
                return Err(StorageError::AlreadyRecorded {
                    user_id: report.user_id,
                    match_id: report.match_id,
                });
            }
            let mut entry = stats
                .entry(report.user_id.clone())
                .or_insert_with(|| PlayerStats::newcomer(&report.user_id));
            apply_outcome(entry.value_mut(), &report);
            Ok(entry.value().clone())
        }
        .boxed()
    }
}
