//! Redis-backed per-usage-plan and per-sensitive-method throttles,
//! layered in front of (and tighter than) the general per-user limiter in
//! `middleware::rate_limit`.

use std::collections::HashMap;
use std::ops::DerefMut;

use deadpool_redis::Pool as RedisPool;
use tracing::warn;

use crate::error::Error;

/// Daily quota plus a burst+sustained rate for one usage plan
/// (`default` / `premium` / `admin`, per `SubscriptionTier::as_usage_plan`).
#[derive(Debug, Clone, Copy)]
pub struct PlanLimits {
    pub daily_quota: u32,
    pub requests_per_minute: u32,
}

fn default_plan_table() -> HashMap<&'static str, PlanLimits> {
    HashMap::from([
        ("default", PlanLimits { daily_quota: 2_000, requests_per_minute: 60 }),
        ("premium", PlanLimits { daily_quota: 20_000, requests_per_minute: 300 }),
        ("admin", PlanLimits { daily_quota: 200_000, requests_per_minute: 1_000 }),
    ])
}

#[derive(Clone)]
pub struct UsagePlanThrottle {
    redis: RedisPool,
    plans: HashMap<&'static str, PlanLimits>,
}

impl UsagePlanThrottle {
    pub fn new(redis: RedisPool) -> Self {
        Self { redis, plans: default_plan_table() }
    }

    /// Enforces both the plan's daily quota and its per-minute rate,
    /// keyed by `(plan, principal)` so different users on the same plan
    /// don't share a bucket.
    pub async fn check(&self, plan: &str, principal: &str) -> Result<(), Error> {
        let limits = *self.plans.get(plan).unwrap_or_else(|| {
            warn!(plan, "unknown usage plan, falling back to default limits");
            self.plans.get("default").expect("default plan always present")
        });

        self.check_window(&format!("planquota:{plan}:{principal}:daily"), limits.daily_quota, 86_400).await?;
        self.check_window(&format!("planquota:{plan}:{principal}:minute"), limits.requests_per_minute, 60).await
    }

    async fn check_window(&self, key: &str, limit: u32, window_secs: i64) -> Result<(), Error> {
        let mut conn = self.redis.get().await.map_err(|e| Error::Internal(format!("redis pool error: {e}")))?;

        let count: u32 = redis::cmd("INCR").arg(key).query_async(conn.deref_mut()).await?;
        if count == 1 {
            let _: () = redis::cmd("EXPIRE").arg(key).arg(window_secs).query_async(conn.deref_mut()).await?;
        }
        if count > limit {
            return Err(Error::Throttled(format!("usage plan limit of {limit} exceeded for {key}")));
        }
        Ok(())
    }
}

/// Tighter per-principal throttle for the handful of expensive,
/// explicitly-named sensitive routes (`POST /quests`,
/// `POST /quests/check-completion`, `GET /quests/analytics`,
/// `POST /quests/templates`).
#[derive(Clone)]
pub struct SensitiveMethodThrottle {
    redis: RedisPool,
    requests_per_minute: u32,
}

impl SensitiveMethodThrottle {
    pub fn new(redis: RedisPool, requests_per_minute: u32) -> Self {
        Self { redis, requests_per_minute }
    }

    pub async fn check(&self, principal: &str, method: &str, path: &str) -> Result<(), Error> {
        let mut conn = self.redis.get().await.map_err(|e| Error::Internal(format!("redis pool error: {e}")))?;
        let key = format!("sensitive:{method}:{path}:{principal}");

        let count: u32 = redis::cmd("INCR").arg(&key).query_async(conn.deref_mut()).await?;
        if count == 1 {
            let _: () = redis::cmd("EXPIRE").arg(&key).arg(60).query_async(conn.deref_mut()).await?;
        }
        if count > self.requests_per_minute {
            return Err(Error::Throttled(format!("sensitive endpoint limit of {}/min exceeded", self.requests_per_minute)));
        }
        Ok(())
    }
}

/// The static set of routes `SensitiveMethodThrottle` applies to.
pub const SENSITIVE_ROUTES: &[(&str, &str)] =
    &[("POST", "/quests"), ("POST", "/quests/check-completion"), ("GET", "/quests/analytics"), ("POST", "/quests/templates")];
