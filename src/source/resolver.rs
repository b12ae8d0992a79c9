//! Indirection resolver for values read from a database column.
//!
//! A stored value may be the payload itself or a pointer to it. The
//! steps run in order and the first that applies wins:
//!
//! 1. `data:<mime>;base64,<payload>`: decode the payload. A payload that
//!    is not valid base64 falls through to the next step.
//! 2. `http://` or `https://`: GET the URL. `200` returns the body,
//!    `404` is not-found, anything else fails with `IndirectFetchFailed`.
//! 3. Plain base64 of the whole value: return the decoded bytes.
//! 4. Anything else: return the value unchanged.
//!
//! Only step 2 can fail; malformed encodings degrade to the raw bytes.

use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use bytes::Bytes;
use hyper::StatusCode;

use super::outbound::Outbound;
use crate::error::StratumError;

/// Standard alphabet, padding required, lenient about trailing bits.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

#[derive(Clone)]
pub struct Resolver {
    outbound: Outbound,
}

impl Resolver {
    #[must_use]
    pub const fn new(outbound: Outbound) -> Self {
        Self { outbound }
    }

    /// Resolve a raw column value into the bytes to serve.
    ///
    /// `Ok(None)` only comes from a remote URL answering `404`.
    pub async fn resolve(&self, raw: Bytes) -> Result<Option<Bytes>, StratumError> {
        if let Some(decoded) = decode_data_uri(&raw) {
            return Ok(Some(decoded));
        }
        if let Some(url) = remote_url(&raw) {
            return self.fetch_remote(url).await;
        }
        if let Some(decoded) = decode_base64(&raw) {
            return Ok(Some(decoded));
        }
        Ok(Some(raw))
    }

    async fn fetch_remote(&self, url: &str) -> Result<Option<Bytes>, StratumError> {
        let failed = |reason: String| StratumError::IndirectFetchFailed {
            url: url.to_string(),
            reason,
        };

        let response = self
            .outbound
            .get(url, None)
            .await
            .map_err(|e| failed(e.to_string()))?;

        match response.status {
            StatusCode::OK => Ok(Some(response.body)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(failed(format!("non-200 status {status}"))),
        }
    }
}

/// Decode `data:...;base64,<payload>`; `None` when not applicable or when
/// the payload does not decode.
#[must_use]
pub fn decode_data_uri(raw: &[u8]) -> Option<Bytes> {
    let rest = raw.strip_prefix(b"data:")?;
    let comma = rest.iter().position(|&b| b == b',')?;
    let (meta, payload) = (&rest[..comma], &rest[comma + 1..]);
    if !meta.windows(7).any(|w| w == b";base64") {
        return None;
    }
    BASE64.decode(payload).ok().map(Bytes::from)
}

/// The value as a URL when it starts with an http(s) scheme.
#[must_use]
pub fn remote_url(raw: &[u8]) -> Option<&str> {
    if raw.starts_with(b"http://") || raw.starts_with(b"https://") {
        std::str::from_utf8(raw).ok()
    } else {
        None
    }
}

#[must_use]
pub fn decode_base64(raw: &[u8]) -> Option<Bytes> {
    BASE64.decode(raw).ok().map(Bytes::from)
}
