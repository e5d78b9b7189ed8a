//! Read-through cache helper shared by the handlers listed against a
//! [`CachedRoute`] in the external interface contract.

use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use waymark_core::edge::{CachedRoute, ResponseCache};
use waymark_core::error::{Error, Result};

/// Serves `variant` of `route` for `principal` from cache if present,
/// otherwise calls `compute`, caches the JSON-encoded result, and serves
/// that. `variant` disambiguates query parameters (pagination cursor,
/// analytics period, ...) within the same route+principal cache bucket.
pub async fn read_through<T, F, Fut>(
    cache: &ResponseCache,
    route: CachedRoute,
    principal: &str,
    variant: &str,
    compute: F,
) -> Result<Response>
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    if let Some(body) = cache.get(route, principal, variant).await? {
        return Ok(json_response(body));
    }

    let value = compute().await?;
    let body = serde_json::to_string(&value).map_err(|e| Error::Internal(format!("cache encode failed: {e}")))?;
    cache.set(route, principal, variant, &body).await?;
    Ok(json_response(body))
}

fn json_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}
