use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::pvp::{
        HistoryQuery, HistoryResponse, JoinQueueResponse, RoundResultPayload,
        SubmitDecisionRequest, WaitingResponse,
    },
    error::AppError,
    routes::identity::Identity,
    services::{
        history_service,
        match_service::{self, SubmitOutcome},
        matchmaking_service,
    },
    state::SharedState,
};

/// Queue, decision and history routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/pvp/queue/join", post(join_queue))
        .route("/pvp/queue/leave", post(leave_queue))
        .route("/pvp/submit", post(submit_decision))
        .route("/pvp/history", get(history))
}

/// Join the matchmaking queue. Requires an open match connection.
#[utoipa::path(
    post,
    path = "/pvp/queue/join",
    tag = "pvp",
    params(("X-User-Id" = String, Header, description = "Caller identity")),
    responses(
        (status = 200, description = "Queued; searching for an opponent", body = JoinQueueResponse),
        (status = 401, description = "Missing identity"),
        (status = 409, description = "No live match connection, or already in a match"),
    )
)]
/// Enter the matchmaking queue.
pub async fn join_queue(
    State(state): State<SharedState>,
    Identity(user_id): Identity,
) -> Result<Json<JoinQueueResponse>, AppError> {
    let response = matchmaking_service::join_queue(&state, &user_id).await?;
    Ok(Json(response))
}

/// Leave the matchmaking queue.
#[utoipa::path(
    post,
    path = "/pvp/queue/leave",
    tag = "pvp",
    params(("X-User-Id" = String, Header, description = "Caller identity")),
    responses(
        (status = 204, description = "Left the queue"),
        (status = 401, description = "Missing identity"),
    )
)]
/// Leave the matchmaking queue.
pub async fn leave_queue(
    State(state): State<SharedState>,
    Identity(user_id): Identity,
) -> StatusCode {
    matchmaking_service::leave_queue(&state, &user_id).await;
    StatusCode::NO_CONTENT
}

/// Submit a decision for the current round.
#[utoipa::path(
    post,
    path = "/pvp/submit",
    tag = "pvp",
    params(("X-User-Id" = String, Header, description = "Caller identity")),
    request_body = SubmitDecisionRequest,
    responses(
        (status = 200, description = "Round decided and scored", body = RoundResultPayload),
        (status = 202, description = "Decision recorded; waiting for the opponent", body = WaitingResponse),
        (status = 400, description = "Invalid decision or elapsed time"),
        (status = 404, description = "Unknown match or round, or caller not in the match"),
        (status = 409, description = "Decision already submitted or round closed"),
    )
)]
/// Submit a decision for the current round.
pub async fn submit_decision(
    State(state): State<SharedState>,
    Identity(user_id): Identity,
    Valid(Json(request)): Valid<Json<SubmitDecisionRequest>>,
) -> Result<Response, AppError> {
    let response = match match_service::submit_decision(&state, &user_id, request).await? {
        SubmitOutcome::Completed(result) => (StatusCode::OK, Json(*result)).into_response(),
        SubmitOutcome::Waiting(waiting) => (StatusCode::ACCEPTED, Json(waiting)).into_response(),
    };
    Ok(response)
}

/// Completed matches of the caller, newest first, with aggregate stats.
#[utoipa::path(
    get,
    path = "/pvp/history",
    tag = "pvp",
    params(
        ("X-User-Id" = String, Header, description = "Caller identity"),
        HistoryQuery,
    ),
    responses(
        (status = 200, description = "Match history", body = HistoryResponse),
        (status = 401, description = "Missing identity"),
    )
)]
/// Completed matches and aggregate stats of the caller.
pub async fn history(
    State(state): State<SharedState>,
    Identity(user_id): Identity,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let response = history_service::history(&state, &user_id, query.limit).await?;
    Ok(Json(response))
}
