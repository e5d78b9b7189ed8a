//! `GET /ws/rooms/{roomId}?token=` upgrade and the `/rooms/{roomId}/messages`
//! history endpoint.
//!
//! The WebSocket upgrade can't carry an `Authorization` header from a
//! browser client, so the bearer token rides in the `token` query parameter
//! instead (§4.11's "bearer via query" auth mode) and is validated here,
//! before the socket is accepted, rather than by the shared JWT middleware.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use waymark_core::domain::ChatMessage;
use waymark_core::error::{Error, Result};
use waymark_core::guilds::GuildsService;
use waymark_core::messaging::MessagingService;
use waymark_core::store::Page;

use crate::pagination::PageQuery;
use crate::state::GatewayState;

const GUILD_ROOM_PREFIX: &str = "GUILD#";

#[derive(Debug, Clone, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
}

/// The documented client→server frame: `{"text": "..."}`.
#[derive(Debug, Clone, Deserialize)]
struct IncomingFrame {
    text: String,
}

/// The documented server→client error frame: `{"error": <code>, "message": "..."}`.
#[derive(Debug, Clone, Serialize)]
struct ErrorFrame<'a> {
    error: &'a str,
    message: String,
}

pub async fn room_upgrade(
    State(state): State<GatewayState>,
    Path(room_id): Path<String>,
    Query(auth): Query<WsAuthQuery>,
    upgrade: WebSocketUpgrade,
) -> Result<Response> {
    let claims = state.app.jwt_auth().validate_token(&auth.token)?;
    let user_id = claims.user_id()?;

    if let Some(guild_id) = room_id.strip_prefix(GUILD_ROOM_PREFIX) {
        let guild_id = Uuid::parse_str(guild_id).map_err(|_| Error::Validation(format!("invalid guild room id {room_id}")))?;
        state.guilds.require_membership(guild_id, user_id).await?;
    }

    Ok(upgrade.on_upgrade(move |socket| handle_socket(socket, state.messaging.clone(), room_id, user_id)))
}

async fn handle_socket(socket: WebSocket, messaging: MessagingService, room_id: String, user_id: Uuid) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::channel::<WsMessage>(32);

    let connection_id = messaging.registry().connect(room_id.clone(), user_id.to_string(), tx.clone()).await;

    let forward = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            WsMessage::Text(text) => {
                let frame: IncomingFrame = match serde_json::from_str(text.as_str()) {
                    Ok(frame) => frame,
                    Err(_) => {
                        send_error_frame(&tx, "validation.malformed_frame", "expected a JSON {\"text\": string} frame").await;
                        continue;
                    }
                };
                if let Err(error) = messaging.send_message(&room_id, user_id, &frame.text).await {
                    tracing::warn!(%room_id, %user_id, %error, "chat message rejected");
                    send_error_frame(&tx, error.code(), error.to_string()).await;
                }
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    messaging.registry().disconnect(connection_id).await;
    forward.abort();
}

async fn send_error_frame(tx: &tokio::sync::mpsc::Sender<WsMessage>, code: &str, message: impl Into<String>) {
    let frame = ErrorFrame { error: code, message: message.into() };
    if let Ok(payload) = serde_json::to_string(&frame) {
        let _ = tx.send(WsMessage::Text(payload.into())).await;
    }
}

pub async fn list_messages(
    State(state): State<GatewayState>,
    Path(room_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<ChatMessage>>> {
    let page = state.messaging.list_messages(&room_id, page.into()).await?;
    Ok(Json(page))
}
