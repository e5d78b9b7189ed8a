//! `x-api-key` middleware for the routes marked `api-key` or `bearer+api-key`
//! in the external interface contract. Bearer verification for protected
//! routes is `waymark_core::middleware::JwtAuth::middleware`; this is the
//! other half, checked independently so `bearer+api-key` routes require both.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use waymark_core::error::Error;

use crate::state::GatewayState;

const API_KEY_HEADER: &str = "x-api-key";

pub async fn require_api_key(
    State(state): State<GatewayState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    check_api_key(request.headers(), state.app.config().api_key.as_str())?;
    Ok(next.run(request).await)
}

fn check_api_key(headers: &HeaderMap, expected: &str) -> Result<(), Error> {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Auth { code: "auth.missing_api_key", message: "missing x-api-key header".to_string() })?;

    if provided != expected {
        return Err(Error::Auth { code: "auth.invalid_api_key", message: "invalid x-api-key".to_string() });
    }
    Ok(())
}
