//! Edge-layer middleware: per-IP throttling (outermost, unauthenticated),
//! and the per-plan / sensitive-route throttles that run after `JwtAuth`
//! has attached [`Claims`] to the request.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use waymark_core::edge::SENSITIVE_ROUTES;
use waymark_core::error::Error;
use waymark_core::middleware::Claims;

use crate::state::GatewayState;

pub async fn ip_throttle(
    State(state): State<GatewayState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    state.ip_throttle.check(addr.ip())?;
    Ok(next.run(request).await)
}

pub async fn usage_plan(
    State(state): State<GatewayState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    if let Some(claims) = request.extensions().get::<Claims>() {
        let plan = claims.tier.as_deref().unwrap_or("default");
        state.usage_plan.check(plan, &claims.sub).await?;
    }
    Ok(next.run(request).await)
}

pub async fn sensitive_throttle(
    State(state): State<GatewayState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    let method = request.method().as_str();
    let path = request.uri().path();

    if SENSITIVE_ROUTES.iter().any(|(m, p)| *m == method && *p == path) {
        if let Some(claims) = request.extensions().get::<Claims>() {
            state.sensitive_throttle.check(&claims.sub, method, path).await?;
        }
    }
    Ok(next.run(request).await)
}
