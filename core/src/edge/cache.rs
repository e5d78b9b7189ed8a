//! Principal-keyed response cache for read-only endpoints, backed by the
//! same `deadpool_redis` pool the rest of the edge layer throttles with.

use std::ops::DerefMut;

use deadpool_redis::Pool as RedisPool;

use crate::error::Error;

/// Per-route TTLs, per §4.11: quest list 5 min, analytics 10 min,
/// templates 15 min, profile 5 min.
#[derive(Debug, Clone, Copy)]
pub enum CachedRoute {
    QuestList,
    QuestAnalytics,
    QuestTemplates,
    Profile,
}

impl CachedRoute {
    pub fn ttl_secs(self) -> u64 {
        match self {
            Self::QuestList => 300,
            Self::QuestAnalytics => 600,
            Self::QuestTemplates => 900,
            Self::Profile => 300,
        }
    }

    fn namespace(self) -> &'static str {
        match self {
            Self::QuestList => "cache:quests:list",
            Self::QuestAnalytics => "cache:quests:analytics",
            Self::QuestTemplates => "cache:quests:templates",
            Self::Profile => "cache:profile",
        }
    }
}

#[derive(Clone)]
pub struct ResponseCache {
    redis: RedisPool,
}

impl ResponseCache {
    pub fn new(redis: RedisPool) -> Self {
        Self { redis }
    }

    /// The cache key always includes the authorization principal so one
    /// user's cached page is never served to another.
    fn key(route: CachedRoute, principal: &str, variant: &str) -> String {
        format!("{}:{principal}:{variant}", route.namespace())
    }

    pub async fn get(&self, route: CachedRoute, principal: &str, variant: &str) -> Result<Option<String>, Error> {
        let mut conn = self.redis.get().await.map_err(|e| Error::Internal(format!("redis pool error: {e}")))?;
        let value: Option<String> = redis::cmd("GET").arg(Self::key(route, principal, variant)).query_async(conn.deref_mut()).await?;
        Ok(value)
    }

    pub async fn set(&self, route: CachedRoute, principal: &str, variant: &str, body: &str) -> Result<(), Error> {
        let mut conn = self.redis.get().await.map_err(|e| Error::Internal(format!("redis pool error: {e}")))?;
        let _: () = redis::cmd("SET")
            .arg(Self::key(route, principal, variant))
            .arg(body)
            .arg("EX")
            .arg(route.ttl_secs())
            .query_async(conn.deref_mut())
            .await?;
        Ok(())
    }

    pub async fn invalidate(&self, route: CachedRoute, principal: &str, variant: &str) -> Result<(), Error> {
        let mut conn = self.redis.get().await.map_err(|e| Error::Internal(format!("redis pool error: {e}")))?;
        let _: () = redis::cmd("DEL").arg(Self::key(route, principal, variant)).query_async(conn.deref_mut()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttls_match_the_external_contract() {
        assert_eq!(CachedRoute::QuestList.ttl_secs(), 300);
        assert_eq!(CachedRoute::QuestAnalytics.ttl_secs(), 600);
        assert_eq!(CachedRoute::QuestTemplates.ttl_secs(), 900);
        assert_eq!(CachedRoute::Profile.ttl_secs(), 300);
    }

    #[test]
    fn cache_key_is_principal_scoped() {
        let a = ResponseCache::key(CachedRoute::QuestList, "user-1", "page:1");
        let b = ResponseCache::key(CachedRoute::QuestList, "user-2", "page:1");
        assert_ne!(a, b);
    }
}
