//! Webhook payload and response bodies for the subscription surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{SubscriptionEvent, SubscriptionEventKind, SubscriptionTier};

/// Inbound webhook body. `event_id` is the idempotency key; replays of the
/// same event must be no-ops.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionWebhookRequest {
    pub event_id: String,
    pub user_id: Uuid,
    pub kind: SubscriptionEventKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionEventResponse {
    pub event_id: String,
    pub user_id: Uuid,
    pub kind: SubscriptionEventKind,
    pub received_at: DateTime<Utc>,
}

impl From<&SubscriptionEvent> for SubscriptionEventResponse {
    fn from(e: &SubscriptionEvent) -> Self {
        Self { event_id: e.event_id.clone(), user_id: e.user_id, kind: e.kind, received_at: e.received_at }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TierResponse {
    pub user_id: Uuid,
    pub tier: SubscriptionTier,
    pub version: i64,
}
