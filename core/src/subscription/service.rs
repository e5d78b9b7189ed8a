//! Subscription tier and event ledger, fed by a signed webhook.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::domain::{keys, EntityType, SubscriptionEvent, SubscriptionEventKind, SubscriptionTier, UserProfile};
use crate::error::{Error, Result};
use crate::store::{CoreStore, StoreItem};

use super::dto::{SubscriptionEventResponse, SubscriptionWebhookRequest, TierResponse};

type HmacSha256 = Hmac<Sha256>;

/// Retry budget for the optimistic-concurrency tier update, mirroring the
/// gamification service's contention retry for a scalar profile field.
const MAX_CONTENTION_RETRIES: u32 = 5;

#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn CoreStore>,
    webhook_secret: String,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn CoreStore>, webhook_secret: impl Into<String>) -> Self {
        Self { store, webhook_secret: webhook_secret.into() }
    }

    /// Verifies the `X-Signature` header (base64 HMAC-SHA256 over the raw
    /// request body) before the body is ever deserialized into
    /// [`SubscriptionWebhookRequest`].
    pub fn verify_signature(&self, body: &[u8], signature_b64: &str) -> Result<()> {
        let signature = BASE64
            .decode(signature_b64)
            .map_err(|_| Error::Auth { code: "auth.invalid_signature", message: "malformed webhook signature".to_string() })?;

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|e| Error::Internal(format!("hmac key setup failed: {e}")))?;
        mac.update(body);
        mac.verify_slice(&signature)
            .map_err(|_| Error::Auth { code: "auth.invalid_signature", message: "webhook signature mismatch".to_string() })
    }

    /// Records the event (idempotent on `event_id` via `put_if_absent`) and
    /// advances the user's tier under optimistic concurrency. A replayed
    /// event is a no-op once the ledger row already exists.
    pub async fn handle_event(&self, request: SubscriptionWebhookRequest) -> Result<SubscriptionEventResponse> {
        let event = SubscriptionEvent { event_id: request.event_id.clone(), user_id: request.user_id, kind: request.kind, received_at: Utc::now() };

        let ledger_pk = keys::user_pk(&request.user_id.to_string());
        let ledger_sk = keys::subscription_event_sk(&request.event_id);
        let ledger_item = StoreItem::new(
            ledger_pk,
            ledger_sk,
            EntityType::SubscriptionEvent,
            serde_json::to_value(&event).map_err(|e| Error::Internal(format!("serialize subscription event: {e}")))?,
        );

        if self.store.put_if_absent(ledger_item).await.is_err() {
            return Ok(SubscriptionEventResponse::from(&event));
        }

        let new_tier = match request.kind {
            SubscriptionEventKind::Activated => SubscriptionTier::Plus,
            SubscriptionEventKind::Canceled => SubscriptionTier::Free,
        };
        self.advance_tier(request.user_id, new_tier).await?;

        Ok(SubscriptionEventResponse::from(&event))
    }

    pub async fn get_tier(&self, user_id: Uuid) -> Result<TierResponse> {
        let pk = keys::user_pk(&user_id.to_string());
        let item = self.store.get(&pk, keys::PROFILE_SK).await?.ok_or_else(|| Error::NotFound(format!("user {user_id} not found")))?;
        let profile: UserProfile = item.attrs_as()?;
        Ok(TierResponse { user_id, tier: profile.tier, version: item.version })
    }

    async fn advance_tier(&self, user_id: Uuid, new_tier: SubscriptionTier) -> Result<()> {
        let pk = keys::user_pk(&user_id.to_string());
        for _ in 0..MAX_CONTENTION_RETRIES {
            let item = self.store.get(&pk, keys::PROFILE_SK).await?.ok_or_else(|| Error::NotFound(format!("user {user_id} not found")))?;
            let mut profile: UserProfile = item.attrs_as()?;
            profile.tier = new_tier;
            profile.updated_at = Utc::now();

            let attrs = serde_json::to_value(&profile).map_err(|e| Error::Internal(format!("serialize profile: {e}")))?;
            match self.store.update_with_version(&pk, keys::PROFILE_SK, item.version, attrs).await {
                Ok(_) => return Ok(()),
                Err(Error::ConflictVersion(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::ConflictVersion(format!("could not advance tier for user {user_id} after {MAX_CONTENTION_RETRIES} retries")))
    }
}
