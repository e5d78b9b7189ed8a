//! Connection registry: per-room membership, broadcast fan-out, and the
//! monotonic sort-key counter that orders chat messages within a room.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::websocket::{ConnectionId, Message, Room, RoomConfig, RoomId, RoomManager, RoomMember};

/// Tracks active WebSocket connections grouped by room, and hands out the
/// next sort key for a room's chat history so two racing senders never
/// collide on the same `MSG#{sort_key}` sort key.
#[derive(Clone)]
pub struct ConnectionRegistry {
    rooms: RoomManager,
    sort_keys: Arc<DashMap<RoomId, AtomicU64>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RoomManager::new(RoomConfig {
                enabled: true,
                max_members: 1000,
                max_rooms_per_connection: 10,
                idle_timeout_secs: 3600,
            }),
            sort_keys: Arc::new(DashMap::new()),
        }
    }

    pub async fn connect(&self, room_id: impl Into<RoomId>, user_id: String, sender: mpsc::Sender<Message>) -> ConnectionId {
        let member = RoomMember::authenticated(ConnectionId::new(), sender, user_id);
        let connection_id = member.connection_id;
        self.rooms.join(room_id.into(), member).await;
        connection_id
    }

    pub async fn disconnect(&self, connection_id: ConnectionId) {
        self.rooms.disconnect(connection_id).await;
    }

    pub async fn broadcast(&self, room_id: impl Into<RoomId>, message: Message, exclude: Option<ConnectionId>) -> usize {
        self.rooms.broadcast(&room_id.into(), message, exclude).await
    }

    pub async fn room_size(&self, room_id: impl Into<RoomId>) -> usize {
        self.rooms.member_count(&room_id.into()).await
    }

    /// Allocates the next sort key for `room_id`, starting at 1. Sort keys
    /// are per-room, monotonically increasing, and never reused.
    pub fn next_sort_key(&self, room_id: &str) -> u64 {
        self.sort_keys
            .entry(RoomId::new(room_id))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::SeqCst)
            + 1
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(dead_code)]
fn _assert_room_type(_room: Room) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_keys_are_monotonic_per_room() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.next_sort_key("guild-1"), 1);
        assert_eq!(registry.next_sort_key("guild-1"), 2);
        assert_eq!(registry.next_sort_key("guild-2"), 1);
    }

    #[tokio::test]
    async fn connect_adds_to_room_and_disconnect_removes() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(8);
        let conn = registry.connect("guild-1", "user-1".to_string(), tx).await;
        assert_eq!(registry.room_size("guild-1").await, 1);

        registry.disconnect(conn).await;
        assert_eq!(registry.room_size("guild-1").await, 0);
    }
}
