//! WebSocket support shared by the messaging service.
//!
//! WebSocket connections upgrade from HTTP on the same port as the REST
//! API. This module provides the low-level primitives (connection ids,
//! rooms, broadcasting); `crate::messaging` builds the chat-specific
//! connect/frame/disconnect flow on top of them.

mod config;
mod handler;
mod rooms;

pub use config::{RoomConfig, WebSocketConfig};
pub use handler::{ConnectionId, WebSocketConnection};
pub use rooms::{Room, RoomId, RoomManager, RoomMember};

pub use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
