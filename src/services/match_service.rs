//! Match lifecycle: the per-match driver, decision intake and disconnect forfeits.
//!
//! The driver is the only place where match pacing lives. Decision intake never waits for the
//! opponent; it settles the round under the record lock and wakes the driver.

use std::sync::Arc;

use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    dao::models::OutcomeReport,
    dto::{
        common::ScenarioView,
        pvp::{
            MatchResultPayload, OpponentLeftPayload, RoundResultPayload, RoundStartPayload,
            SubmitDecisionRequest, WaitingResponse,
        },
        ws::OutboundMessage,
    },
    error::ServiceError,
    services::match_events,
    state::{
        SharedState,
        matches::MatchSlot,
        pvp_match::{MatchError, PvpMatch, RoundCompletion, Side, UserId},
        scenario::Decision,
        scoring::MatchOutcome,
    },
};

/// Result of a decision submission.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Both players decided; the round is scored.
    Completed(Box<RoundResultPayload>),
    /// Decision recorded; the opponent has not decided yet.
    Waiting(WaitingResponse),
}

/// Record a player's decision and settle the round when both sides are in.
pub async fn submit_decision(
    state: &SharedState,
    user_id: &str,
    request: SubmitDecisionRequest,
) -> Result<SubmitOutcome, ServiceError> {
    let config = state.config();
    let decision = request
        .decision
        .parse::<Decision>()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    if !config.scoring.accepts_elapsed(request.time_elapsed) {
        return Err(ServiceError::InvalidInput(format!(
            "time_elapsed must be within [0, {}] seconds",
            config.scoring.time_limit_secs
        )));
    }

    let slot = state
        .matches()
        .get(request.match_id)
        .ok_or_else(|| ServiceError::NotFound(format!("match {} not found", request.match_id)))?;
    let round_number = request.round_number;
    let scenario = slot.scenario(round_number);

    let payload = {
        let mut record = slot.record.lock().await;
        let side = record
            .side_of(user_id)
            .ok_or_else(|| MatchError::NotParticipant(user_id.to_string()))?;
        record.submit_decision(round_number, user_id, decision, request.time_elapsed)?;
        info!(
            match_id = %slot.id,
            round = round_number,
            user_id = %user_id,
            decision = %decision,
            "decision recorded"
        );

        match record.try_complete_round(round_number, &config.scoring)? {
            RoundCompletion::Completed => record.accumulate_score(round_number)?,
            RoundCompletion::AlreadyCompleted => {}
            RoundCompletion::Pending => {
                return Ok(SubmitOutcome::Waiting(WaitingResponse::new(
                    slot.id,
                    round_number,
                )));
            }
        }

        let round = record
            .round(round_number)
            .ok_or(MatchError::RoundNotFound(round_number))?;
        RoundResultPayload::for_side(&record, round, side, scenario.as_deref())
            .ok_or(MatchError::RoundNotDecided(round_number))?
    };

    slot.signal_round_completed(round_number);
    Ok(SubmitOutcome::Completed(Box::new(payload)))
}

/// Drive a freshly paired match to its end, or until it is cancelled.
pub async fn run_match(state: SharedState, slot: Arc<MatchSlot>) {
    let cancelled = slot.cancellation();
    tokio::select! {
        _ = cancelled.cancelled() => {
            info!(match_id = %slot.id, "match driver stopped: match cancelled");
        }
        result = drive(&state, &slot) => {
            if let Err(err) = result {
                error!(match_id = %slot.id, error = %err, "match driver failed; cancelling match");
                abort_match(&state, &slot, "the match could not continue").await;
            }
        }
    }
}

async fn drive(state: &SharedState, slot: &Arc<MatchSlot>) -> Result<(), ServiceError> {
    let config = state.config();
    sleep(config.pacing.pre_round_delay).await;

    let total_rounds = {
        let mut record = slot.record.lock().await;
        record.start()?;
        record.total_rounds()
    };
    info!(match_id = %slot.id, total_rounds, "match started");

    let mut round_number = 1;
    loop {
        play_round(state, slot, round_number).await?;
        if round_number >= total_rounds {
            break;
        }
        sleep(config.pacing.inter_round_delay).await;
        round_number = slot.record.lock().await.advance_round()?;
    }

    sleep(config.pacing.pre_result_delay).await;
    finish_match(state, slot).await
}

/// Open one round, wait for it to be decided or to time out, then deliver the results.
async fn play_round(
    state: &SharedState,
    slot: &Arc<MatchSlot>,
    round_number: u8,
) -> Result<(), ServiceError> {
    let config = state.config();
    let (tier, total_rounds) = {
        let record = slot.record.lock().await;
        (record.tier, record.total_rounds())
    };

    let scenario = Arc::new(state.scenarios().get_scenario(tier).await?);
    slot.attach_scenario(round_number, Arc::clone(&scenario));
    slot.record
        .lock()
        .await
        .create_round(round_number, scenario.id, scenario.correct_decision)?;

    let start = OutboundMessage::RoundStart(RoundStartPayload {
        match_id: slot.id,
        round_number,
        total_rounds,
        time_limit_seconds: config.scoring.time_limit_secs,
        scenario: ScenarioView::from(scenario.as_ref()),
    });
    let delivered = match_events::broadcast(state, slot.id, &start, None).await;
    info!(match_id = %slot.id, round = round_number, delivered, "round started");

    let mut decided = slot.decided_rounds();
    let settled = timeout(config.round_deadline(), async {
        decided
            .wait_for(|latest| *latest >= round_number)
            .await
            .map(|_| ())
    })
    .await;

    if !matches!(settled, Ok(Ok(()))) {
        let mut record = slot.record.lock().await;
        if record.expire_round(round_number, &config.scoring)? == RoundCompletion::Completed {
            record.accumulate_score(round_number)?;
            warn!(
                match_id = %slot.id,
                round = round_number,
                "round deadline passed; missing decisions timed out"
            );
        }
    }

    deliver_round_results(state, slot, round_number).await
}

/// Send each room member the round outcome from their own side.
async fn deliver_round_results(
    state: &SharedState,
    slot: &Arc<MatchSlot>,
    round_number: u8,
) -> Result<(), ServiceError> {
    let members = state.registry().room_members(slot.id).await;
    let scenario = slot.scenario(round_number);

    let messages: Vec<(UserId, OutboundMessage)> = {
        let record = slot.record.lock().await;
        let round = record
            .round(round_number)
            .ok_or(MatchError::RoundNotFound(round_number))?;
        members
            .into_iter()
            .filter_map(|member| {
                let side = record.side_of(&member)?;
                let payload =
                    RoundResultPayload::for_side(&record, round, side, scenario.as_deref())?;
                Some((member, OutboundMessage::RoundResult(Box::new(payload))))
            })
            .collect()
    };

    for (member, message) in &messages {
        match_events::send(state, member, message).await;
    }
    info!(match_id = %slot.id, round = round_number, "round result delivered");
    Ok(())
}

/// Complete the match, report outcomes to the stats store and send each player their result.
async fn finish_match(state: &SharedState, slot: &Arc<MatchSlot>) -> Result<(), ServiceError> {
    let record = {
        let mut record = slot.record.lock().await;
        let winner = record.determine_winner();
        record.complete(winner)?;
        record.clone()
    };
    info!(
        match_id = %slot.id,
        winner = record.winner().map(String::as_str).unwrap_or("tie"),
        score_a = record.score(Side::A),
        score_b = record.score(Side::B),
        "match completed"
    );

    for side in [Side::A, Side::B] {
        match settle_player(state, &record, side).await {
            Ok(payload) => {
                let message = OutboundMessage::MatchResult(Box::new(payload));
                match_events::send(state, record.player(side), &message).await;
            }
            Err(err) => error!(
                match_id = %record.id,
                user_id = %record.player(side),
                error = %err,
                "failed to record match outcome"
            ),
        }
    }

    release_match(state, slot, &record).await;
    Ok(())
}

/// Apply the reward rules for one player and build their match result.
async fn settle_player(
    state: &SharedState,
    record: &PvpMatch,
    side: Side,
) -> Result<MatchResultPayload, ServiceError> {
    let config = state.config();
    let rewards = &config.rewards;
    let user_id = record.player(side);
    let outcome = match record.winner() {
        None => MatchOutcome::Tie,
        Some(winner) if winner == user_id => MatchOutcome::Win,
        Some(_) => MatchOutcome::Loss,
    };

    let stats = state.stats();
    let before = stats.player_stats(user_id).await?;
    let points_delta = rewards.points_delta(outcome, before.win_streak);
    let streak_bonus = match outcome {
        MatchOutcome::Win => rewards.streak_bonus_for(before.win_streak),
        MatchOutcome::Loss | MatchOutcome::Tie => 0,
    };

    let updated = stats
        .record_outcome(OutcomeReport {
            user_id: user_id.clone(),
            match_id: record.id,
            outcome,
            points_delta,
        })
        .await?;

    Ok(MatchResultPayload::for_side(
        record,
        side,
        outcome,
        points_delta,
        streak_bonus,
        &updated,
    ))
}

/// Dissolve the room and drop both players from the active-match index.
async fn release_match(state: &SharedState, slot: &Arc<MatchSlot>, record: &PvpMatch) {
    state.registry().close_room(slot.id).await;
    state.matches().retire(record);
    for player in [&record.player_a, &record.player_b] {
        if let Some((_, forfeit)) = state.forfeits().remove(player) {
            forfeit.cancel();
        }
    }
}

/// Cancel a match that cannot continue and tell both players.
async fn abort_match(state: &SharedState, slot: &Arc<MatchSlot>, reason: &str) {
    let record = {
        let mut record = slot.record.lock().await;
        if !record.status().is_terminal()
            && let Err(err) = record.cancel()
        {
            warn!(match_id = %slot.id, error = %err, "failed to cancel match");
        }
        record.clone()
    };
    slot.cancel();

    let message = OutboundMessage::Error(reason.to_string());
    match_events::broadcast(state, slot.id, &message, None).await;
    release_match(state, slot, &record).await;
}

/// Drop a match that never got going because a player was already gone. Nobody is notified.
pub(crate) async fn discard_match(state: &SharedState, slot: &Arc<MatchSlot>) {
    let record = {
        let mut record = slot.record.lock().await;
        if !record.status().is_terminal()
            && let Err(err) = record.cancel()
        {
            warn!(match_id = %slot.id, error = %err, "failed to cancel match");
        }
        record.clone()
    };
    slot.cancel();
    release_match(state, slot, &record).await;
}

/// Start the forfeit timer for a player whose connection went away mid-match.
pub fn handle_disconnect(state: &SharedState, user_id: &str) {
    let Some(slot) = state.matches().active_for(user_id) else {
        return;
    };

    let token = CancellationToken::new();
    if let Some(previous) = state
        .forfeits()
        .insert(user_id.to_string(), token.clone())
    {
        previous.cancel();
    }

    let grace = state.config().pacing.disconnect_grace;
    info!(
        match_id = %slot.id,
        user_id = %user_id,
        grace_ms = grace.as_millis() as u64,
        "player disconnected mid-match"
    );

    let state = state.clone();
    let user_id = user_id.to_string();
    tokio::spawn(async move {
        let match_over = slot.cancellation();
        tokio::select! {
            _ = token.cancelled() => return,
            _ = match_over.cancelled() => return,
            _ = sleep(grace) => {}
        }

        token.cancel();
        state
            .forfeits()
            .remove_if(&user_id, |_, current| current.is_cancelled());

        if state.registry().is_connected(&user_id) {
            debug!(user_id = %user_id, "player is back; no forfeit");
            return;
        }
        forfeit_match(&state, &slot, &user_id).await;
    });
}

/// Cancel the match of a player who never came back and notify the opponent.
async fn forfeit_match(state: &SharedState, slot: &Arc<MatchSlot>, user_id: &str) {
    let (record, opponent) = {
        let mut record = slot.record.lock().await;
        if record.status().is_terminal() {
            return;
        }
        if let Err(err) = record.cancel() {
            warn!(match_id = %slot.id, error = %err, "failed to cancel match");
            return;
        }
        let opponent = record.opponent_of(user_id).cloned();
        (record.clone(), opponent)
    };
    slot.cancel();
    warn!(match_id = %slot.id, user_id = %user_id, "player did not reconnect; match cancelled");

    if let Some(opponent) = opponent {
        let message = OutboundMessage::OpponentLeft(OpponentLeftPayload {
            match_id: slot.id,
            opponent_id: user_id.to_string(),
            message: "your opponent left the match".into(),
        });
        match_events::send(state, &opponent, &message).await;
    }
    release_match(state, slot, &record).await;
}

/// Put a reconnecting player back into their match room and stop the forfeit timer.
pub async fn handle_reconnect(state: &SharedState, user_id: &str) {
    if let Some((_, forfeit)) = state.forfeits().remove(user_id) {
        forfeit.cancel();
    }

    let Some(slot) = state.matches().active_for(user_id) else {
        return;
    };
    if slot.record.lock().await.status().is_terminal() {
        return;
    }
    match state.registry().join_room(user_id, slot.id).await {
        Ok(()) => info!(match_id = %slot.id, user_id = %user_id, "player rejoined match room"),
        Err(err) => debug!(error = %err, "player already in match room"),
    }
}
