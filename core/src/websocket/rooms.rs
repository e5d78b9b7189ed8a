//! Room/channel management for WebSocket connections.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};

use super::config::RoomConfig;
use super::handler::ConnectionId;

/// Unique identifier for a room
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A member of a room
#[derive(Debug, Clone)]
pub struct RoomMember {
    pub connection_id: ConnectionId,
    pub sender: mpsc::Sender<Message>,
    pub user_id: Option<String>,
    pub joined_at: DateTime<Utc>,
}

impl RoomMember {
    #[must_use]
    pub fn new(connection_id: ConnectionId, sender: mpsc::Sender<Message>) -> Self {
        Self { connection_id, sender, user_id: None, joined_at: Utc::now() }
    }

    #[must_use]
    pub fn authenticated(connection_id: ConnectionId, sender: mpsc::Sender<Message>, user_id: String) -> Self {
        Self { connection_id, sender, user_id: Some(user_id), joined_at: Utc::now() }
    }
}

/// A chat room / channel
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub members: HashMap<ConnectionId, RoomMember>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

impl Room {
    #[must_use]
    pub fn new(id: RoomId) -> Self {
        let now = Utc::now();
        Self { id, members: HashMap::new(), created_at: now, last_activity: now, metadata: HashMap::new() }
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

#[derive(Debug)]
struct RoomManagerInner {
    rooms: HashMap<RoomId, Room>,
    connection_rooms: HashMap<ConnectionId, HashSet<RoomId>>,
    max_members_per_room: usize,
    max_rooms_per_connection: usize,
}

/// In-memory room manager: join/leave/broadcast, guarded by a single
/// `RwLock`. Rooms are created on first join and removed once empty.
#[derive(Debug, Clone)]
pub struct RoomManager {
    inner: Arc<RwLock<RoomManagerInner>>,
}

impl RoomManager {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RoomManagerInner {
                rooms: HashMap::new(),
                connection_rooms: HashMap::new(),
                max_members_per_room: config.max_members,
                max_rooms_per_connection: config.max_rooms_per_connection,
            })),
        }
    }

    /// Joins `member` to `room_id`, returning `false` if the connection or
    /// room is already at capacity.
    pub async fn join(&self, room_id: RoomId, member: RoomMember) -> bool {
        let mut inner = self.inner.write().await;
        let connection_id = member.connection_id;

        let max_rooms = inner.max_rooms_per_connection;
        let connection_rooms = inner.connection_rooms.entry(connection_id).or_default();
        if connection_rooms.len() >= max_rooms {
            tracing::warn!(%connection_id, limit = max_rooms, "connection at max room limit");
            return false;
        }

        let max_members = inner.max_members_per_room;
        let room = inner.rooms.entry(room_id.clone()).or_insert_with(|| Room::new(room_id.clone()));
        if room.members.len() >= max_members {
            tracing::warn!(%room_id, limit = max_members, "room at max capacity");
            return false;
        }

        room.members.insert(connection_id, member);
        room.touch();
        inner.connection_rooms.entry(connection_id).or_default().insert(room_id.clone());

        tracing::info!(%room_id, %connection_id, "member joined room");
        true
    }

    pub async fn leave(&self, room_id: &RoomId, connection_id: ConnectionId) {
        let mut inner = self.inner.write().await;

        if let Some(room) = inner.rooms.get_mut(room_id) {
            room.members.remove(&connection_id);
            room.touch();
            if room.is_empty() {
                inner.rooms.remove(room_id);
            }
        }
        if let Some(rooms) = inner.connection_rooms.get_mut(&connection_id) {
            rooms.remove(room_id);
        }
    }

    /// Drops `connection_id` from every room it had joined.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut inner = self.inner.write().await;

        let Some(room_ids) = inner.connection_rooms.remove(&connection_id) else {
            return;
        };

        for room_id in room_ids {
            if let Some(room) = inner.rooms.get_mut(&room_id) {
                room.members.remove(&connection_id);
                if room.is_empty() {
                    inner.rooms.remove(&room_id);
                }
            }
        }
    }

    /// Broadcasts `message` to every member of `room_id`, optionally
    /// skipping `exclude_sender`. Returns the number of successful sends.
    pub async fn broadcast(&self, room_id: &RoomId, message: Message, exclude_sender: Option<ConnectionId>) -> usize {
        let senders: Vec<_> = {
            let inner = self.inner.read().await;
            match inner.rooms.get(room_id) {
                Some(room) => room
                    .members
                    .values()
                    .filter(|m| exclude_sender.map(|id| m.connection_id != id).unwrap_or(true))
                    .map(|m| m.sender.clone())
                    .collect(),
                None => return 0,
            }
        };

        let mut sent = 0;
        for sender in senders {
            if sender.send(message.clone()).await.is_ok() {
                sent += 1;
            }
        }
        sent
    }

    pub async fn member_count(&self, room_id: &RoomId) -> usize {
        self.inner.read().await.rooms.get(room_id).map(Room::member_count).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RoomConfig {
        RoomConfig { max_members: 10, max_rooms_per_connection: 5 }
    }

    #[test]
    fn room_id_from_string() {
        let id: RoomId = "test-room".into();
        assert_eq!(id.as_str(), "test-room");
    }

    #[tokio::test]
    async fn join_leave_and_broadcast() {
        let manager = RoomManager::new(config());
        let room_id = RoomId::new("guild-1");

        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        let conn1 = ConnectionId::new();
        let conn2 = ConnectionId::new();

        assert!(manager.join(room_id.clone(), RoomMember::authenticated(conn1, tx1, "u1".to_string())).await);
        assert!(manager.join(room_id.clone(), RoomMember::authenticated(conn2, tx2, "u2".to_string())).await);
        assert_eq!(manager.member_count(&room_id).await, 2);

        let sent = manager.broadcast(&room_id, Message::Text("hi".into()), Some(conn1)).await;
        assert_eq!(sent, 1);
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());

        manager.leave(&room_id, conn1).await;
        assert_eq!(manager.member_count(&room_id).await, 1);

        manager.disconnect(conn2).await;
        assert_eq!(manager.member_count(&room_id).await, 0);
    }
}
