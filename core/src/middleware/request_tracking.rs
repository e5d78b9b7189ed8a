//! Request-id propagation and sensitive-header redaction layers.

use axum::{body::Body, http::Request};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    sensitive_headers::SetSensitiveHeadersLayer,
};

use crate::ids::MakeTypedRequestId;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Stamps every inbound request with a [`RequestId`](crate::ids::RequestId)
/// under `x-request-id`, unless the caller already supplied one.
pub fn request_id_layer() -> SetRequestIdLayer<MakeTypedRequestId> {
    SetRequestIdLayer::new(
        http::HeaderName::from_static(REQUEST_ID_HEADER),
        MakeTypedRequestId,
    )
}

/// Copies the request id from the request onto the response so clients can
/// correlate logs across hops.
pub fn request_id_propagation_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(http::HeaderName::from_static(REQUEST_ID_HEADER))
}

/// Marks `authorization` and `cookie` headers as sensitive so tracing/log
/// layers never print their values.
pub fn sensitive_headers_layer() -> SetSensitiveHeadersLayer {
    SetSensitiveHeadersLayer::new([
        http::header::AUTHORIZATION,
        http::header::COOKIE,
        http::HeaderName::from_static("x-api-key"),
    ])
}

#[allow(dead_code)]
fn _assert_request_type(_req: Request<Body>) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_header_name_is_lowercase() {
        assert_eq!(REQUEST_ID_HEADER, "x-request-id");
    }
}
