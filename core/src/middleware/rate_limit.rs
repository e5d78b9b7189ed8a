//! Redis-backed per-user rate limiting middleware.

use std::ops::DerefMut;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use deadpool_redis::Pool as RedisPool;
use tracing::warn;

use crate::{error::Error, middleware::jwt::Claims};

/// Fixed-window request counter keyed by user id, stored in Redis as
/// `ratelimit:user:{sub}` with TTL `window_secs`.
#[derive(Clone)]
pub struct RateLimit {
    requests_per_hour: u32,
    window_secs: i64,
    redis_pool: RedisPool,
}

impl RateLimit {
    pub fn new(requests_per_hour: u32, redis_pool: RedisPool) -> Self {
        Self {
            requests_per_hour,
            window_secs: 3600,
            redis_pool,
        }
    }

    pub async fn middleware(State(rate_limit): State<Self>, request: Request<Body>, next: Next) -> Result<Response, Error> {
        let claims = request.extensions().get::<Claims>().cloned();

        match claims {
            Some(claims) => rate_limit.check_rate_limit(&claims.sub).await?,
            None => warn!("rate limit middleware invoked without jwt claims in request extensions"),
        }

        Ok(next.run(request).await)
    }

    async fn check_rate_limit(&self, subject: &str) -> Result<(), Error> {
        let mut conn = self.redis_pool.get().await.map_err(|e| Error::Internal(format!("redis pool error: {e}")))?;

        let key = format!("ratelimit:user:{subject}");

        let count: u32 = redis::cmd("INCR").arg(&key).query_async(conn.deref_mut()).await?;

        if count == 1 {
            let _: () = redis::cmd("EXPIRE").arg(&key).arg(self.window_secs).query_async(conn.deref_mut()).await?;
        }

        if count > self.requests_per_hour {
            warn!(subject, count, limit = self.requests_per_hour, "rate limit exceeded");
            return Err(Error::Throttled(format!("rate limit of {} requests/hour exceeded", self.requests_per_hour)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_key_is_namespaced_per_user() {
        let subject = "user-123";
        assert_eq!(format!("ratelimit:user:{subject}"), "ratelimit:user:user-123");
    }
}
