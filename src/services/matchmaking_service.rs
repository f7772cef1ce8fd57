//! Queue admission and the per-player opponent search.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    dto::{
        pvp::{JoinQueueResponse, MatchFoundPayload},
        ws::OutboundMessage,
    },
    error::ServiceError,
    services::{match_events, match_service},
    state::{
        SharedState,
        pvp_match::{PvpMatch, UserId},
        queue::{PairingOutcome, QueueEntry},
        tier::RankTier,
    },
};

/// Admit a connected player into the queue and start searching for an opponent.
pub async fn join_queue(
    state: &SharedState,
    user_id: &str,
) -> Result<JoinQueueResponse, ServiceError> {
    if !state.registry().is_connected(user_id) {
        return Err(ServiceError::InvalidState(
            "open a match connection before joining the queue".into(),
        ));
    }
    if let Some(slot) = state.matches().active_for(user_id) {
        return Err(ServiceError::Conflict(format!(
            "already playing match {}",
            slot.id
        )));
    }

    let stats = state.stats().player_stats(user_id).await?;
    let ticket = state.queue().join(user_id, stats.rank_tier).await;
    info!(
        user_id = %user_id,
        tier = ?stats.rank_tier,
        position = ticket.position,
        "player joined the queue"
    );

    spawn_search(state, user_id, stats.rank_tier);
    Ok(ticket.into())
}

/// Withdraw a player from the queue and stop their search. No-op when not queued.
pub async fn leave_queue(state: &SharedState, user_id: &str) {
    stop_search(state, user_id);
    if state.queue().leave(user_id).await {
        info!(user_id = %user_id, "player left the queue");
    }
}

fn stop_search(state: &SharedState, user_id: &str) {
    if let Some((_, search)) = state.searches().remove(user_id) {
        search.cancel();
    }
}

fn spawn_search(state: &SharedState, user_id: &str, tier: RankTier) {
    let token = CancellationToken::new();
    if let Some(previous) = state.searches().insert(user_id.to_string(), token.clone()) {
        previous.cancel();
    }

    let state = state.clone();
    let user_id = user_id.to_string();
    tokio::spawn(async move {
        search(&state, &user_id, tier, &token).await;
        // Only clears the handle when it is still ours; a newer search keeps its own.
        token.cancel();
        state
            .searches()
            .remove_if(&user_id, |_, current| current.is_cancelled());
    });
}

/// Poll for an opponent until paired, cancelled, disconnected or timed out.
async fn search(state: &SharedState, user_id: &str, tier: RankTier, cancel: &CancellationToken) {
    let config = state.config();
    let deadline = Instant::now() + config.matchmaking.search_timeout;
    let mut ticker = interval(config.matchmaking.poll_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(user_id = %user_id, "search cancelled");
                return;
            }
            _ = sleep_until(deadline) => {
                state.queue().leave(user_id).await;
                warn!(user_id = %user_id, "matchmaking timed out");
                let message = OutboundMessage::Error(
                    "matchmaking timed out: no opponent found".into(),
                );
                match_events::send(state, user_id, &message).await;
                return;
            }
            _ = ticker.tick() => {}
        }

        if !state.registry().is_connected(user_id) {
            state.queue().leave(user_id).await;
            info!(user_id = %user_id, "player disconnected while searching; withdrawn from queue");
            return;
        }

        let registry = state.registry();
        let outcome = state
            .queue()
            .find_opponent_where(user_id, tier, |candidate| registry.is_connected(candidate))
            .await;
        match outcome {
            PairingOutcome::Paired(opponent) => {
                create_match(state, user_id, tier, opponent).await;
                return;
            }
            PairingOutcome::NoCandidate => {
                debug!(user_id = %user_id, "no opponent yet");
            }
            PairingOutcome::NotQueued => {
                debug!(user_id = %user_id, "no longer queued; search ends");
                return;
            }
        }
    }
}

/// Open a match for a freshly paired couple and hand it to a driver.
async fn create_match(state: &SharedState, user_id: &str, tier: RankTier, opponent: QueueEntry) {
    stop_search(state, &opponent.user_id);

    let config = state.config();
    let opponent_tier = opponent.tier;
    let record = PvpMatch::new(
        user_id.to_string(),
        opponent.user_id.clone(),
        tier.min(opponent_tier),
        config.scoring.total_rounds,
    );
    let match_tier = record.tier;
    let total_rounds = record.total_rounds();
    let slot = state.matches().insert(record);
    let players: [UserId; 2] = [user_id.to_string(), opponent.user_id];

    for player in &players {
        if let Err(err) = state.registry().join_room(player, slot.id).await {
            warn!(match_id = %slot.id, error = %err, "failed to join match room");
        }
    }

    // A player who dropped after pairing but before the match was registered missed the
    // mid-match disconnect handling; such a match never starts.
    if players
        .iter()
        .any(|player| !state.registry().is_connected(player))
    {
        warn!(match_id = %slot.id, "player left before the match started; discarding it");
        match_service::discard_match(state, &slot).await;
        for (player, player_tier) in [(&players[0], tier), (&players[1], opponent_tier)] {
            if state.registry().is_connected(player) {
                state.queue().join(player, player_tier).await;
                spawn_search(state, player, player_tier);
            }
        }
        return;
    }

    info!(
        match_id = %slot.id,
        player_a = %players[0],
        player_b = %players[1],
        tier = ?match_tier,
        "match found"
    );

    for (player, rival) in [(&players[0], &players[1]), (&players[1], &players[0])] {
        let message = OutboundMessage::MatchFound(MatchFoundPayload {
            match_id: slot.id,
            opponent_id: rival.clone(),
            total_rounds,
            tier: match_tier,
        });
        match_events::send(state, player, &message).await;
    }

    tokio::spawn(match_service::run_match(state.clone(), slot));
}
