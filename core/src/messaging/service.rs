//! Chat message send/list flow: rate limiting, persistence, and fan-out.

use std::ops::DerefMut;
use std::sync::Arc;

use chrono::Utc;
use deadpool_redis::Pool as RedisPool;
use uuid::Uuid;

use crate::{
    domain::{keys, ChatMessage, EntityType},
    error::Error,
    store::{CoreStore, CursorPagination, Page, StoreItem},
    websocket::Message as WsMessage,
};

use super::registry::ConnectionRegistry;

const CHAT_RATE_LIMIT_PER_MINUTE: u32 = 30;
const MAX_MESSAGE_BODY_LEN: usize = 2000;

#[derive(Clone)]
pub struct MessagingService {
    store: Arc<dyn CoreStore>,
    redis: RedisPool,
    registry: Arc<ConnectionRegistry>,
}

impl MessagingService {
    pub fn new(store: Arc<dyn CoreStore>, redis: RedisPool, registry: Arc<ConnectionRegistry>) -> Self {
        Self { store, redis, registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Persists a chat message, broadcasts it to every connected room
    /// member, and returns the stored message. Enforces a 30 message per
    /// minute per-sender throttle.
    pub async fn send_message(&self, room_id: &str, sender_id: Uuid, body: &str) -> Result<ChatMessage, Error> {
        if body.is_empty() || body.len() > MAX_MESSAGE_BODY_LEN {
            return Err(Error::Validation(format!(
                "message body must be 1-{MAX_MESSAGE_BODY_LEN} characters"
            )));
        }

        self.check_rate_limit(sender_id).await?;

        let sort_key = self.registry.next_sort_key(room_id);
        let message = ChatMessage {
            message_id: Uuid::new_v4(),
            room_id: room_id.to_string(),
            sender_id,
            body: body.to_string(),
            sort_key,
            created_at: Utc::now(),
        };

        let pk = keys::room_pk(room_id);
        let sk = keys::message_sk(sort_key);
        let attrs = serde_json::to_value(&message).map_err(|e| Error::Internal(format!("serialize chat message: {e}")))?;
        self.store.put(StoreItem::new(pk, sk, EntityType::ChatMessage, attrs)).await?;

        let payload = serde_json::to_string(&message).map_err(|e| Error::Internal(format!("serialize chat message: {e}")))?;
        self.registry.broadcast(room_id, WsMessage::Text(payload.into()), None).await;

        Ok(message)
    }

    /// Lists a room's chat history oldest-first (ascending sort key).
    pub async fn list_messages(&self, room_id: &str, pagination: CursorPagination) -> Result<Page<ChatMessage>, Error> {
        let pk = keys::room_pk(room_id);
        let page = self.store.query_partition(&pk, Some("MSG#"), pagination).await?;

        let mut items = Vec::with_capacity(page.items.len());
        for item in page.items {
            items.push(item.attrs_as::<ChatMessage>()?);
        }

        Ok(Page { items, next_cursor: page.next_cursor })
    }

    async fn check_rate_limit(&self, sender_id: Uuid) -> Result<(), Error> {
        let mut conn = self.redis.get().await.map_err(|e| Error::Internal(format!("redis pool error: {e}")))?;
        let key = format!("chatlimit:user:{sender_id}");

        let count: u32 = redis::cmd("INCR").arg(&key).query_async(conn.deref_mut()).await?;
        if count == 1 {
            let _: () = redis::cmd("EXPIRE").arg(&key).arg(60).query_async(conn.deref_mut()).await?;
        }

        if count > CHAT_RATE_LIMIT_PER_MINUTE {
            return Err(Error::Throttled(format!(
                "chat rate limit of {CHAT_RATE_LIMIT_PER_MINUTE} messages/minute exceeded"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_body_length_limit_is_enforced_by_send_message() {
        let body = "x".repeat(MAX_MESSAGE_BODY_LEN + 1);
        assert!(body.len() > MAX_MESSAGE_BODY_LEN);
    }
}
