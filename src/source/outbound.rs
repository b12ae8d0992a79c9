//! Outbound HTTP GET shared by the API source and the indirection
//! resolver.
//!
//! Wraps the connection-pooled hyper client from
//! [`server::build_http_client`](crate::server::build_http_client) with
//! the configured `User-Agent` override and a per-request timeout. The
//! whole body is collected before returning.

use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderName, HeaderValue, USER_AGENT};
use hyper::{Method, StatusCode, Uri};

use crate::error::StratumError;
use crate::server::HttpClient;

#[derive(Debug)]
pub struct OutboundResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Clone)]
pub struct Outbound {
    client: HttpClient,
    user_agent: Option<HeaderValue>,
    timeout: Duration,
}

impl Outbound {
    /// An empty or invalid user agent disables the override.
    #[must_use]
    pub fn new(client: HttpClient, user_agent: Option<&str>, timeout: Duration) -> Self {
        let user_agent = user_agent.filter(|ua| !ua.is_empty()).and_then(|ua| {
            HeaderValue::from_str(ua)
                .map_err(|e| {
                    tracing::warn!(user_agent = %ua, error = %e, "invalid User-Agent, not sending one");
                })
                .ok()
        });
        Self {
            client,
            user_agent,
            timeout,
        }
    }

    /// GET `url`, optionally with one extra header.
    ///
    /// Malformed URLs fail with `UriParse`; DNS, connect, body and
    /// timeout failures fail with `UpstreamUnreachable`. Any status code
    /// is returned as-is for the caller to interpret.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn get(
        &self,
        url: &str,
        extra: Option<&(HeaderName, HeaderValue)>,
    ) -> Result<OutboundResponse, StratumError> {
        let uri: Uri = url.parse().map_err(|e: hyper::http::uri::InvalidUri| {
            StratumError::UriParse {
                source: Box::new(e),
            }
        })?;

        let mut builder = hyper::Request::builder().method(Method::GET).uri(uri);
        if let Some(ua) = &self.user_agent {
            builder = builder.header(USER_AGENT, ua);
        }
        if let Some((name, value)) = extra {
            builder = builder.header(name, value);
        }
        let req = builder
            .body(Full::new(Bytes::new()))
            .map_err(|e| StratumError::HttpRequest {
                source: Box::new(e),
            })?;

        let unreachable = |source: Box<dyn std::error::Error + Send + Sync>| {
            StratumError::UpstreamUnreachable {
                url: url.to_string(),
                source,
            }
        };

        let start = Instant::now();
        let exchange = async {
            let response = self
                .client
                .request(req)
                .await
                .map_err(|e| unreachable(Box::new(e)))?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| unreachable(Box::new(e)))?
                .to_bytes();
            Ok::<_, StratumError>((status, body))
        };

        // One deadline covers headers and body
        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| unreachable(format!("timed out after {:?}", self.timeout).into()))??;

        tracing::debug!(
            url = %url,
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            bytes = body.len(),
            "outbound request completed"
        );

        Ok(OutboundResponse { status, body })
    }
}
