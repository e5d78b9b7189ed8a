//! In-memory per-IP sliding-window throttle at the edge, independent of the
//! Redis-backed per-user/per-plan limiters. Grounded on the teacher's
//! governor middleware (`middleware::governor`), simplified to a single
//! keyed limiter rather than the full per-route pattern table.

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};

use crate::error::Error;

type IpLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default edge-level IP throttle: 2000 requests per 5-minute window.
pub const DEFAULT_REQUESTS_PER_WINDOW: u32 = 2000;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct IpThrottle {
    requests_per_window: u32,
    window: Duration,
    limiters: Arc<DashMap<IpAddr, Arc<IpLimiter>>>,
}

impl IpThrottle {
    pub fn new(requests_per_window: u32, window: Duration) -> Self {
        Self { requests_per_window, window, limiters: Arc::new(DashMap::new()) }
    }

    /// Checks (and consumes one token from) the calling IP's bucket.
    pub fn check(&self, ip: IpAddr) -> Result<(), Error> {
        let limiter = self
            .limiters
            .entry(ip)
            .or_insert_with(|| Arc::new(Self::create_limiter(self.requests_per_window, self.window)))
            .clone();

        limiter.check().map_err(|_| Error::Throttled(format!("ip {ip} exceeded {} requests per {:?}", self.requests_per_window, self.window)))
    }

    /// Drops tracked IPs beyond `max_entries`, bounding memory for an
    /// edge process that sees a long tail of one-off client addresses.
    pub fn sweep(&self, max_entries: usize) {
        if self.limiters.len() <= max_entries {
            return;
        }
        let excess = self.limiters.len() - max_entries;
        let stale: Vec<IpAddr> = self.limiters.iter().take(excess).map(|e| *e.key()).collect();
        for ip in stale {
            self.limiters.remove(&ip);
        }
    }

    fn create_limiter(requests_per_window: u32, window: Duration) -> IpLimiter {
        let replenish_interval = window / requests_per_window.max(1);
        let quota = Quota::with_period(replenish_interval)
            .expect("replenish interval must be nonzero")
            .allow_burst(NonZeroU32::new(requests_per_window.max(1)).expect("requests_per_window must be nonzero"));
        RateLimiter::direct(quota)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_requests_within_burst() {
        let throttle = IpThrottle::new(5, Duration::from_secs(60));
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        for _ in 0..5 {
            assert!(throttle.check(ip).is_ok());
        }
        assert!(throttle.check(ip).is_err());
    }

    #[test]
    fn tracks_distinct_ips_independently() {
        let throttle = IpThrottle::new(1, Duration::from_secs(60));
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(throttle.check(a).is_ok());
        assert!(throttle.check(b).is_ok());
        assert!(throttle.check(a).is_err());
    }
}
