//! Subscription tier and event ledger fed by a signed webhook.

pub mod dto;
pub mod service;

pub use dto::{SubscriptionEventResponse, SubscriptionWebhookRequest, TierResponse};
pub use service::SubscriptionService;
