//! Request-side cache-bypass detection and response header rendering.

use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

pub const X_CACHE_STATUS: HeaderName = HeaderName::from_static("x-cache-status");
pub const X_CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Bypass,
}

impl CacheStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
            Self::Bypass => "BYPASS",
        }
    }

    #[must_use]
    pub const fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

/// True when the client asked to skip the cache.
///
/// `Pragma` must equal `no-cache`; `Cache-Control` only has to contain it.
#[must_use]
pub fn bypass_requested(headers: &HeaderMap) -> bool {
    let pragma = headers
        .get(header::PRAGMA)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "no-cache");

    let cache_control = headers
        .get(header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("no-cache"));

    pragma || cache_control
}

/// Render `Cache-Control: public, max-age=<seconds>`.
#[must_use]
pub fn cache_control(ttl: Duration) -> HeaderValue {
    let value = format!("public, max-age={}", ttl.as_secs());
    // Digits and ASCII punctuation are always a valid header value
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("public"))
}
