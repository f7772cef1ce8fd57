use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, interval_at, timeout},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{InboundKind, InboundMessage, OutboundMessage},
    services::{match_events, match_service, matchmaking_service},
    state::{SharedState, pvp_match::UserId, registry::ConnectionHandle},
};

/// Handle the full lifecycle of one player's match connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket, user_id: UserId) {
    let config = state.config();
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) =
        mpsc::channel::<Message>(config.connection.outbound_capacity);

    let heartbeat = config
        .connection
        .heartbeat_interval
        .max(Duration::from_millis(1));
    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        let mut pings = interval_at(Instant::now() + heartbeat, heartbeat);
        loop {
            tokio::select! {
                message = outbound_rx.recv() => {
                    let Some(message) = message else { break };
                    if sender.send(message).await.is_err() {
                        break;
                    }
                }
                _ = pings.tick() => {
                    if sender.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = sender.close().await;
    });

    let handle = ConnectionHandle::new(user_id.clone(), outbound_tx.clone());
    let connection_id = handle.id;
    let closed = handle.closed();
    state.registry().register(handle);
    info!(user_id = %user_id, connection_id = %connection_id, "match connection opened");

    match_service::handle_reconnect(&state, &user_id).await;

    loop {
        let frame = tokio::select! {
            _ = closed.cancelled() => {
                info!(user_id = %user_id, "connection superseded or dropped by the server");
                break;
            }
            frame = timeout(config.connection.read_timeout, receiver.next()) => frame,
        };

        match frame {
            Ok(Some(Ok(Message::Text(text)))) => {
                handle_text(&user_id, &outbound_tx, text.as_str());
            }
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(err))) => {
                warn!(user_id = %user_id, error = %err, "websocket receive error");
                break;
            }
            Err(_) => {
                warn!(user_id = %user_id, "connection silent for too long; closing");
                break;
            }
        }
    }

    finalize(&state, &user_id, connection_id, writer_task, outbound_tx).await;
}

/// React to one client text frame. Only `ping` needs an answer.
fn handle_text(user_id: &str, outbound_tx: &mpsc::Sender<Message>, raw: &str) {
    let inbound = match InboundMessage::from_json_str(raw) {
        Ok(message) => message,
        Err(err) => {
            warn!(user_id = %user_id, error = %err, "failed to parse client message");
            return;
        }
    };

    match inbound.kind {
        InboundKind::Ping => {
            let Some(pong) = match_events::encode(&OutboundMessage::Pong) else {
                return;
            };
            if outbound_tx.try_send(pong).is_err() {
                warn!(user_id = %user_id, "outbound queue full; pong dropped");
            }
        }
        InboundKind::Pong => debug!(user_id = %user_id, "pong received"),
        InboundKind::Unknown => debug!(user_id = %user_id, "ignoring unknown message type"),
    }
}

async fn finalize(
    state: &SharedState,
    user_id: &str,
    connection_id: Uuid,
    writer_task: JoinHandle<()>,
    outbound_tx: mpsc::Sender<Message>,
) {
    state.registry().unregister(user_id, connection_id).await;
    // Withdraw before awaiting the writer. A superseded connection leaves the newer one in
    // charge of the player.
    if !state.registry().is_connected(user_id) {
        matchmaking_service::leave_queue(state, user_id).await;
        match_service::handle_disconnect(state, user_id);
    }

    drop(outbound_tx);
    let _ = writer_task.await;
    info!(user_id = %user_id, connection_id = %connection_id, "match connection closed");
}
