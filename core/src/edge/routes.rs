//! Static routing table: method+path to required auth mode, the shape the
//! edge gateway consults before dispatching to a handler.

/// CORS preflight allow-headers, fixed per the external interface contract.
pub const CORS_ALLOW_HEADERS: &[&str] = &[
    "accept",
    "content-type",
    "authorization",
    "x-api-key",
    "origin",
    "referer",
    "x-amz-date",
    "x-amz-security-token",
    "x-requested-with",
];

/// The four auth modes named in the external interface contract's route
/// table, plus the out-of-band signature check the webhook endpoint uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// `x-api-key` only (signup, login, health).
    ApiKey,
    /// Bearer access token only.
    Bearer,
    /// Bearer access token AND `x-api-key` (the analytics endpoint).
    BearerAndApiKey,
    /// Bearer token passed as a `?token=` query parameter, since browser
    /// WebSocket clients can't set an `Authorization` header.
    BearerViaQuery,
    /// No JWT or API key; authenticated instead by an HMAC request
    /// signature (the subscription webhook).
    WebhookSignature,
}

#[derive(Debug, Clone, Copy)]
pub struct RouteEntry {
    pub method: &'static str,
    pub path: &'static str,
    pub auth: AuthMode,
}

/// The full external surface from the external interface contract. The
/// gateway binary matches incoming requests against this table (after path
/// normalization, e.g. collapsing `{id}`-style segments) to decide which
/// auth middleware to run before dispatch.
pub const ROUTES: &[RouteEntry] = &[
    RouteEntry { method: "POST", path: "/users/signup", auth: AuthMode::ApiKey },
    RouteEntry { method: "POST", path: "/users/login", auth: AuthMode::ApiKey },
    RouteEntry { method: "POST", path: "/users/login/google", auth: AuthMode::ApiKey },
    RouteEntry { method: "POST", path: "/users/logout", auth: AuthMode::Bearer },
    RouteEntry { method: "POST", path: "/auth/renew", auth: AuthMode::Bearer },
    RouteEntry { method: "GET", path: "/profile", auth: AuthMode::Bearer },
    RouteEntry { method: "PUT", path: "/profile", auth: AuthMode::Bearer },
    RouteEntry { method: "GET", path: "/quests", auth: AuthMode::Bearer },
    RouteEntry { method: "POST", path: "/quests", auth: AuthMode::Bearer },
    RouteEntry { method: "PUT", path: "/quests/{goalId}", auth: AuthMode::Bearer },
    RouteEntry { method: "DELETE", path: "/quests/{goalId}", auth: AuthMode::Bearer },
    RouteEntry { method: "POST", path: "/quests/createTask", auth: AuthMode::Bearer },
    RouteEntry { method: "PUT", path: "/quests/tasks/{taskId}", auth: AuthMode::Bearer },
    RouteEntry { method: "DELETE", path: "/quests/tasks/{taskId}", auth: AuthMode::Bearer },
    RouteEntry { method: "GET", path: "/quests/progress", auth: AuthMode::Bearer },
    RouteEntry { method: "GET", path: "/quests/{goalId}/progress", auth: AuthMode::Bearer },
    RouteEntry { method: "POST", path: "/quests/createQuest", auth: AuthMode::Bearer },
    RouteEntry { method: "POST", path: "/quests/quests/{id}/start", auth: AuthMode::Bearer },
    RouteEntry { method: "POST", path: "/quests/quests/{id}/cancel", auth: AuthMode::Bearer },
    RouteEntry { method: "POST", path: "/quests/quests/{id}/fail", auth: AuthMode::Bearer },
    RouteEntry { method: "POST", path: "/quests/check-completion", auth: AuthMode::Bearer },
    RouteEntry { method: "GET", path: "/quests/analytics", auth: AuthMode::BearerAndApiKey },
    RouteEntry { method: "GET", path: "/quests/templates", auth: AuthMode::Bearer },
    RouteEntry { method: "POST", path: "/quests/templates", auth: AuthMode::Bearer },
    RouteEntry { method: "GET", path: "/quests/templates/{id}", auth: AuthMode::Bearer },
    RouteEntry { method: "PUT", path: "/quests/templates/{id}", auth: AuthMode::Bearer },
    RouteEntry { method: "DELETE", path: "/quests/templates/{id}", auth: AuthMode::Bearer },
    RouteEntry { method: "GET", path: "/guilds", auth: AuthMode::Bearer },
    RouteEntry { method: "POST", path: "/guilds", auth: AuthMode::Bearer },
    RouteEntry { method: "GET", path: "/guilds/{id}", auth: AuthMode::Bearer },
    RouteEntry { method: "PUT", path: "/guilds/{id}", auth: AuthMode::Bearer },
    RouteEntry { method: "POST", path: "/guilds/{id}/join", auth: AuthMode::Bearer },
    RouteEntry { method: "GET", path: "/guilds/{id}/join-requests", auth: AuthMode::Bearer },
    RouteEntry { method: "POST", path: "/guilds/{id}/comments", auth: AuthMode::Bearer },
    RouteEntry { method: "GET", path: "/guilds/{id}/comments", auth: AuthMode::Bearer },
    RouteEntry { method: "POST", path: "/subscriptions/webhook", auth: AuthMode::WebhookSignature },
    RouteEntry { method: "GET", path: "/ws/rooms/{roomId}", auth: AuthMode::BearerViaQuery },
    RouteEntry { method: "GET", path: "/health", auth: AuthMode::ApiKey },
];

/// Matches a concrete request path against a `{param}`-templated route
/// path, segment by segment.
pub fn path_matches(template: &str, actual: &str) -> bool {
    let template_segments: Vec<&str> = template.split('/').filter(|s| !s.is_empty()).collect();
    let actual_segments: Vec<&str> = actual.split('/').filter(|s| !s.is_empty()).collect();
    if template_segments.len() != actual_segments.len() {
        return false;
    }
    template_segments
        .iter()
        .zip(actual_segments.iter())
        .all(|(t, a)| (t.starts_with('{') && t.ends_with('}')) || t == a)
}

pub fn lookup(method: &str, path: &str) -> Option<&'static RouteEntry> {
    ROUTES.iter().find(|r| r.method.eq_ignore_ascii_case(method) && path_matches(r.path, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_templated_segments() {
        assert!(path_matches("/quests/{goalId}", "/quests/abc-123"));
        assert!(!path_matches("/quests/{goalId}", "/quests/abc/extra"));
    }

    #[test]
    fn looks_up_exact_and_templated_routes() {
        assert!(lookup("GET", "/health").is_some());
        assert!(lookup("PUT", "/quests/11111111-1111-1111-1111-111111111111").is_some());
        assert!(lookup("GET", "/nonexistent").is_none());
    }
}
