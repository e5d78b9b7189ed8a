//! Subscription webhook and tier lookup handlers.
//!
//! The webhook signature covers the raw request body, so this handler takes
//! `Bytes` instead of `Json` and deserializes only after `verify_signature`
//! passes.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use uuid::Uuid;
use waymark_core::error::{Error, Result};
use waymark_core::subscription::{SubscriptionEventResponse, SubscriptionWebhookRequest, TierResponse};
use waymark_core::responses::Created;
use axum::Json;

use crate::state::GatewayState;

const SIGNATURE_HEADER: &str = "x-signature";

pub async fn webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Created<SubscriptionEventResponse>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Auth { code: "auth.missing_signature", message: "missing X-Signature header".to_string() })?;

    state.subscription.verify_signature(&body, signature)?;

    let request: SubscriptionWebhookRequest =
        serde_json::from_slice(&body).map_err(|e| Error::Validation(format!("malformed webhook body: {e}")))?;
    let event = state.subscription.handle_event(request).await?;
    Ok(Created::new(event))
}

pub async fn get_tier(State(state): State<GatewayState>, Path(user_id): Path<Uuid>) -> Result<Json<TierResponse>> {
    let tier = state.subscription.get_tier(user_id).await?;
    Ok(Json(tier))
}
