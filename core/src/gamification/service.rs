//! Applies [`GameEvent`]s to a user's XP/level/badge totals.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{keys, EntityType, UserProfile};
use crate::error::{Error, Result};
use crate::store::{CoreStore, StoreItem};

use super::events::{level_for_xp, GameEvent, XP_BADGES};

const MAX_CONTENTION_RETRIES: u32 = 5;

#[derive(Clone)]
pub struct GamificationService {
    store: Arc<dyn CoreStore>,
}

impl GamificationService {
    pub fn new(store: Arc<dyn CoreStore>) -> Self {
        Self { store }
    }

    /// Applies `event` to `user_id`'s profile, returning the updated profile.
    /// Returns `Ok(None)` if this `event_id` was already processed — callers
    /// raise the same event from more than one place (a sweep and the
    /// triggering request can both fire it) and this keeps that safe.
    pub async fn award(&self, user_id: Uuid, event: GameEvent) -> Result<Option<UserProfile>> {
        let user_pk = keys::user_pk(&user_id.to_string());
        let guard_sk = keys::gamification_event_sk(event.event_id());

        let guard = StoreItem::new(
            user_pk.clone(),
            guard_sk,
            EntityType::GamificationEvent,
            serde_json::json!({ "awarded_at": Utc::now() }),
        );
        if self.store.put_if_absent(guard).await.is_err() {
            return Ok(None);
        }

        let xp_delta = i64::from(event.xp());
        let mut attempt = 0;
        loop {
            let item = self
                .store
                .get(&user_pk, keys::PROFILE_SK)
                .await?
                .ok_or_else(|| Error::NotFound(format!("user {user_id} not found")))?;
            let mut profile: UserProfile = item.attrs_as()?;

            profile.xp += xp_delta;
            profile.level = level_for_xp(profile.xp);
            for (threshold, badge) in XP_BADGES {
                if profile.xp >= *threshold && !profile.badges.iter().any(|b| b == badge) {
                    profile.badges.push(badge.to_string());
                }
            }
            profile.updated_at = Utc::now();

            let attrs = serde_json::to_value(&profile).map_err(|e| Error::Internal(format!("serialize profile: {e}")))?;
            match self.store.update_with_version(&user_pk, keys::PROFILE_SK, item.version, attrs).await {
                Ok(_) => {
                    info!(user_id = %user_id, xp_delta, total_xp = profile.xp, "xp awarded");
                    return Ok(Some(profile));
                }
                Err(Error::ConflictVersion(_)) if attempt < MAX_CONTENTION_RETRIES => {
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::events::level_for_xp;

    #[test]
    fn level_grows_every_thousand_xp() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(999), 1);
        assert_eq!(level_for_xp(1000), 2);
        assert_eq!(level_for_xp(10_500), 11);
    }
}
