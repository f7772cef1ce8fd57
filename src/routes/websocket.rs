use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{routes::identity::Identity, services::websocket_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/pvp/ws",
    tag = "pvp",
    params(
        ("X-User-Id" = Option<String>, Header, description = "Caller identity"),
        ("user_id" = Option<String>, Query, description = "Caller identity for clients that cannot set headers"),
    ),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 401, description = "Missing identity"),
    )
)]
/// Upgrade the HTTP connection into the player's match connection.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Identity(user_id): Identity,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_service::handle_socket(state, socket, user_id))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/pvp/ws", get(ws_handler))
}
