//! `stratum health`: check the liveness of a running instance.
//!
//! Sends `GET /health` and succeeds only on `200` with body `OK`.

use http_body_util::BodyExt;
use hyper::StatusCode;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::cli::HealthArgs;
use crate::error::StratumError;

pub async fn execute(args: HealthArgs) -> Result<(), StratumError> {
    let url = format!("{}/health", args.url.trim_end_matches('/'));
    let uri: hyper::Uri =
        url.parse()
            .map_err(|e: hyper::http::uri::InvalidUri| StratumError::UriParse {
                source: Box::new(e),
            })?;

    let connector = hyper_util::client::legacy::connect::HttpConnector::new();
    let client = Client::builder(TokioExecutor::new()).build(connector);

    let req = hyper::Request::builder()
        .uri(uri)
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .map_err(|e| StratumError::HttpRequest {
            source: Box::new(e),
        })?;

    let response = tokio::time::timeout(std::time::Duration::from_secs(10), client.request(req))
        .await
        .map_err(|_| StratumError::HttpRequest {
            source: "health check timed out after 10s".into(),
        })?
        .map_err(|e| StratumError::HttpRequest {
            source: Box::new(e),
        })?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| StratumError::HttpRequest {
            source: Box::new(e),
        })?
        .to_bytes();

    if status != StatusCode::OK || &body[..] != b"OK" {
        return Err(StratumError::HealthCheckFailed(status));
    }

    println!("\u{2713} stratum is healthy ({})", args.url);
    Ok(())
}
