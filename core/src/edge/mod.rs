//! The API gateway's edge layer: per-IP and per-plan throttling, response
//! caching for read-heavy endpoints, and the static routing table.

pub mod cache;
pub mod ip_throttle;
pub mod routes;
pub mod usage_plan;

pub use cache::{CachedRoute, ResponseCache};
pub use ip_throttle::IpThrottle;
pub use routes::{path_matches, AuthMode, RouteEntry, CORS_ALLOW_HEADERS, ROUTES};
pub use usage_plan::{PlanLimits, SensitiveMethodThrottle, UsagePlanThrottle, SENSITIVE_ROUTES};
