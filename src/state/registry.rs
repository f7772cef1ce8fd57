use std::collections::HashMap;

use axum::extract::ws::Message;
use dashmap::DashMap;
use indexmap::IndexSet;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::pvp_match::UserId;

/// Handle used to push messages to one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Distinguishes successive connections of the same user.
    pub id: Uuid,
    pub user_id: UserId,
    tx: mpsc::Sender<Message>,
    closed: CancellationToken,
}

impl ConnectionHandle {
    /// Handle with a fresh connection id.
    pub fn new(user_id: UserId, tx: mpsc::Sender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            tx,
            closed: CancellationToken::new(),
        }
    }

    /// Cancelled once the registry drops this connection.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    fn try_deliver(&self, message: Message) -> bool {
        self.tx.try_send(message).is_ok()
    }
}

/// Errors raised by room membership changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The user is already a member of that room.
    #[error("user `{user_id}` already joined room {match_id}")]
    AlreadyInRoom { user_id: UserId, match_id: Uuid },
}

#[derive(Debug, Default)]
struct Rooms {
    members: HashMap<Uuid, IndexSet<UserId>>,
    membership: HashMap<UserId, Uuid>,
}

impl Rooms {
    fn leave(&mut self, user_id: &str) -> Option<Uuid> {
        let match_id = self.membership.remove(user_id)?;
        if let Some(members) = self.members.get_mut(&match_id) {
            members.shift_remove(user_id);
            if members.is_empty() {
                self.members.remove(&match_id);
            }
        }
        Some(match_id)
    }
}

/// Live connections keyed by user, grouped into match rooms.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<UserId, ConnectionHandle>,
    rooms: RwLock<Rooms>,
}

impl ConnectionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a connection. A previous connection of the same user is closed and replaced.
    pub fn register(&self, handle: ConnectionHandle) {
        let user_id = handle.user_id.clone();
        let connection_id = handle.id;
        if let Some(previous) = self.connections.insert(user_id.clone(), handle) {
            debug!(user_id = %user_id, stale = %previous.id, "replacing stale connection");
            previous.closed.cancel();
        }
        info!(user_id = %user_id, connection_id = %connection_id, "connection registered");
    }

    /// Drop a connection and its room membership.
    ///
    /// Only acts when `connection_id` is still the live one, so a replaced socket tearing down
    /// late cannot evict its successor.
    pub async fn unregister(&self, user_id: &str, connection_id: Uuid) -> bool {
        let Some((_, handle)) = self
            .connections
            .remove_if(user_id, |_, handle| handle.id == connection_id)
        else {
            return false;
        };
        handle.closed.cancel();

        let left = self.rooms.write().await.leave(user_id);
        info!(
            user_id = %user_id,
            connection_id = %connection_id,
            room = ?left,
            "connection unregistered"
        );
        true
    }

    /// Whether the user has a live connection.
    pub fn is_connected(&self, user_id: &str) -> bool {
        self.connections.contains_key(user_id)
    }

    /// Id of the user's current connection.
    pub fn connection_id(&self, user_id: &str) -> Option<Uuid> {
        self.connections.get(user_id).map(|handle| handle.id)
    }

    /// Number of connected users.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Put a user into a match room, leaving any previous room.
    pub async fn join_room(&self, user_id: &str, match_id: Uuid) -> Result<(), RegistryError> {
        let mut rooms = self.rooms.write().await;
        if rooms.membership.get(user_id) == Some(&match_id) {
            return Err(RegistryError::AlreadyInRoom {
                user_id: user_id.to_string(),
                match_id,
            });
        }
        rooms.leave(user_id);
        rooms
            .members
            .entry(match_id)
            .or_default()
            .insert(user_id.to_string());
        rooms.membership.insert(user_id.to_string(), match_id);
        Ok(())
    }

    /// Take the user out of their room, returning it.
    pub async fn leave_room(&self, user_id: &str) -> Option<Uuid> {
        self.rooms.write().await.leave(user_id)
    }

    /// Discard a room, returning its former members.
    pub async fn close_room(&self, match_id: Uuid) -> Vec<UserId> {
        let mut rooms = self.rooms.write().await;
        let members = rooms.members.remove(&match_id).unwrap_or_default();
        for member in &members {
            rooms.membership.remove(member);
        }
        members.into_iter().collect()
    }

    /// Members of a room in join order.
    pub async fn room_members(&self, match_id: Uuid) -> Vec<UserId> {
        self.rooms
            .read()
            .await
            .members
            .get(&match_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Room the user is in.
    pub async fn room_of(&self, user_id: &str) -> Option<Uuid> {
        self.rooms.read().await.membership.get(user_id).copied()
    }

    /// Best-effort delivery to one user. Absent users are skipped silently.
    pub async fn send_to_user(&self, user_id: &str, message: Message) -> bool {
        let Some(handle) = self.connections.get(user_id).map(|entry| entry.clone()) else {
            debug!(user_id = %user_id, "user not connected; message dropped");
            return false;
        };

        if handle.try_deliver(message) {
            return true;
        }
        warn!(user_id = %user_id, "outbound queue full or closed; dropping connection");
        self.unregister(user_id, handle.id).await;
        false
    }

    /// Deliver to every room member except `exclude`, returning how many accepted the message.
    ///
    /// A member whose queue is full or closed is unregistered after the fan-out; the others
    /// still receive the message.
    pub async fn broadcast_to_room(
        &self,
        match_id: Uuid,
        message: Message,
        exclude: Option<&str>,
    ) -> usize {
        let mut delivered = 0;
        let mut failed = Vec::new();
        {
            let rooms = self.rooms.read().await;
            let Some(members) = rooms.members.get(&match_id) else {
                return 0;
            };
            for member in members {
                if exclude == Some(member.as_str()) {
                    continue;
                }
                let Some(handle) = self.connections.get(member) else {
                    continue;
                };
                if handle.try_deliver(message.clone()) {
                    delivered += 1;
                } else {
                    failed.push((member.clone(), handle.id));
                }
            }
        }

        for (user_id, connection_id) in failed {
            warn!(
                user_id = %user_id,
                match_id = %match_id,
                "broadcast delivery failed; dropping connection"
            );
            self.unregister(&user_id, connection_id).await;
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(
        registry: &ConnectionRegistry,
        user_id: &str,
        capacity: usize,
    ) -> (ConnectionHandle, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = ConnectionHandle::new(user_id.to_string(), tx);
        registry.register(handle.clone());
        (handle, rx)
    }

    fn text(body: &str) -> Message {
        Message::Text(body.to_string().into())
    }

    #[tokio::test]
    async fn latest_registration_wins() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = connect(&registry, "alice", 4);
        let (second, mut rx2) = connect(&registry, "alice", 4);

        assert!(first.closed().is_cancelled());
        assert_eq!(registry.connection_id("alice"), Some(second.id));
        assert!(!registry.unregister("alice", first.id).await);
        assert!(registry.is_connected("alice"));

        assert!(registry.send_to_user("alice", text("hi")).await);
        assert!(matches!(rx2.recv().await, Some(Message::Text(_))));
    }

    #[tokio::test]
    async fn sending_to_absent_user_is_silent() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.send_to_user("nobody", text("hi")).await);
    }

    #[tokio::test]
    async fn unregister_leaves_room_and_discards_empty_rooms() {
        let registry = ConnectionRegistry::new();
        let match_id = Uuid::new_v4();
        let (alice, _rx_a) = connect(&registry, "alice", 4);
        let (bob, _rx_b) = connect(&registry, "bob", 4);
        registry.join_room("alice", match_id).await.unwrap();
        registry.join_room("bob", match_id).await.unwrap();

        assert!(registry.unregister("alice", alice.id).await);
        assert!(alice.closed().is_cancelled());
        assert_eq!(registry.room_members(match_id).await, vec!["bob".to_string()]);

        registry.unregister("bob", bob.id).await;
        assert!(registry.room_members(match_id).await.is_empty());
        assert_eq!(registry.room_of("bob").await, None);
    }

    #[tokio::test]
    async fn joining_a_new_room_leaves_the_old_one() {
        let registry = ConnectionRegistry::new();
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        registry.join_room("alice", first).await.unwrap();
        assert_eq!(
            registry.join_room("alice", first).await,
            Err(RegistryError::AlreadyInRoom {
                user_id: "alice".into(),
                match_id: first
            })
        );

        registry.join_room("alice", second).await.unwrap();
        assert!(registry.room_members(first).await.is_empty());
        assert_eq!(registry.room_of("alice").await, Some(second));
    }

    #[tokio::test]
    async fn broadcast_isolates_dead_and_slow_members() {
        let registry = ConnectionRegistry::new();
        let match_id = Uuid::new_v4();
        let (_alive, mut alive_rx) = connect(&registry, "alive", 4);
        let (_dead, dead_rx) = connect(&registry, "dead", 4);
        let (_slow, _slow_rx) = connect(&registry, "slow", 1);
        let (_sender, mut sender_rx) = connect(&registry, "sender", 4);
        drop(dead_rx);
        registry.send_to_user("slow", text("backlog")).await;

        for user in ["dead", "alive", "slow", "sender"] {
            registry.join_room(user, match_id).await.unwrap();
        }

        let delivered = registry
            .broadcast_to_room(match_id, text("round"), Some("sender"))
            .await;
        assert_eq!(delivered, 1);
        assert!(matches!(
            alive_rx.recv().await,
            Some(Message::Text(body)) if body.as_str() == "round"
        ));
        assert!(sender_rx.try_recv().is_err());

        assert!(!registry.is_connected("dead"));
        assert!(!registry.is_connected("slow"));
        assert_eq!(
            registry.room_members(match_id).await,
            vec!["alive".to_string(), "sender".to_string()]
        );
    }

    #[tokio::test]
    async fn close_room_releases_all_members() {
        let registry = ConnectionRegistry::new();
        let match_id = Uuid::new_v4();
        registry.join_room("alice", match_id).await.unwrap();
        registry.join_room("bob", match_id).await.unwrap();

        let mut members = registry.close_room(match_id).await;
        members.sort();
        assert_eq!(members, vec!["alice".to_string(), "bob".to_string()]);
        assert_eq!(registry.room_of("alice").await, None);
    }
}
