use axum::extract::ws::Message;
use tracing::{debug, error};
use uuid::Uuid;

use crate::{dto::ws::OutboundMessage, state::SharedState};

/// Serialize an outbound message into a WebSocket text frame.
pub fn encode(message: &OutboundMessage) -> Option<Message> {
    match message.to_json() {
        Ok(json) => Some(Message::Text(json.into())),
        Err(err) => {
            error!(error = %err, kind = ?message.kind(), "failed to serialize outbound message");
            None
        }
    }
}

/// Deliver a message to one user. Absent users are skipped silently.
pub async fn send(state: &SharedState, user_id: &str, message: &OutboundMessage) -> bool {
    let Some(frame) = encode(message) else {
        return false;
    };
    let delivered = state.registry().send_to_user(user_id, frame).await;
    if !delivered {
        debug!(user_id = %user_id, kind = ?message.kind(), "message not delivered");
    }
    delivered
}

/// Deliver a message to every member of a match room except `exclude`.
pub async fn broadcast(
    state: &SharedState,
    match_id: Uuid,
    message: &OutboundMessage,
    exclude: Option<&str>,
) -> usize {
    let Some(frame) = encode(message) else {
        return 0;
    };
    state
        .registry()
        .broadcast_to_room(match_id, frame, exclude)
        .await
}
