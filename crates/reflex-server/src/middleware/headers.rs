//! Response header middleware.
//!
//! A live reload server must never let the browser cache what it serves:
//! a cached page would survive the very reload the server just triggered.

use axum::http::HeaderValue;
use axum::http::header;
use tower_http::set_header::SetResponseHeaderLayer;

/// Cache-Control header value for all responses.
const CACHE_CONTROL: &str = "no-store";

/// Create layer that adds the Cache-Control header.
pub(crate) fn cache_control_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        header::CACHE_CONTROL,
        HeaderValue::from_static(CACHE_CONTROL),
    )
}
