use crate::{
    dto::pvp::{HistoryResponse, HistoryStats, MatchHistoryItem},
    error::ServiceError,
    state::{SharedState, scoring::MatchOutcome},
};

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: i64 = 50;

/// Clamp the requested page size; anything outside `1..=50` falls back to the default.
fn effective_limit(limit: Option<i64>) -> usize {
    match limit {
        Some(limit) if (1..=MAX_LIMIT).contains(&limit) => limit as usize,
        _ => DEFAULT_LIMIT,
    }
}

/// Completed matches of a player, newest first, with aggregate stats over all of them.
pub async fn history(
    state: &SharedState,
    user_id: &str,
    limit: Option<i64>,
) -> Result<HistoryResponse, ServiceError> {
    let player = state.stats().player_stats(user_id).await?;
    let items: Vec<MatchHistoryItem> = state
        .matches()
        .completed_for(user_id)
        .iter()
        .filter_map(|record| {
            record
                .side_of(user_id)
                .map(|side| MatchHistoryItem::for_side(record, side))
        })
        .collect();

    let mut stats = HistoryStats {
        total_matches: items.len() as u32,
        current_streak: player.win_streak,
        best_streak: player.best_win_streak,
        total_points_won: player.points_won,
        total_points_lost: player.points_lost,
        ..HistoryStats::default()
    };
    for item in &items {
        match item.outcome {
            MatchOutcome::Win => stats.wins += 1,
            MatchOutcome::Loss => stats.losses += 1,
            MatchOutcome::Tie => stats.ties += 1,
        }
    }
    if stats.total_matches > 0 {
        stats.win_rate = f64::from(stats.wins) / f64::from(stats.total_matches) * 100.0;
    }

    let matches = items.into_iter().take(effective_limit(limit)).collect();
    Ok(HistoryResponse { matches, stats })
}
