//! Unified error types for Stratum.
//!
//! Defines [`StratumError`] (the main crate error enum) and
//! [`ValidationError`] for descriptor validation failures. Both use
//! `thiserror` for `Display` and `Error` derives.
//!
//! Startup errors (config, routes, dialects) abort the process. Request
//! errors are caught by the dispatcher, logged, and turned into a `500`
//! without exposing their text to the client.

use std::path::PathBuf;

use hyper::StatusCode;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub project: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "  project {}, {}: {}",
            self.project, self.field, self.message
        )?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StratumError {
    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(StatusCode),

    #[error("Invalid header '{name}' for project {project}")]
    InvalidHeader { project: String, name: String },

    #[error("Malformed route '{route}': {reason}")]
    MalformedRoute { route: String, reason: &'static str },

    #[error("Unsupported database dialect for connection string")]
    UnsupportedDialect,

    #[error("Failed to connect to {dialect} database: {source}")]
    ConnectFailed {
        dialect: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Invalid table or column name: '{0}'")]
    InvalidIdentifier(String),

    #[error("Database query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),

    #[error("Indirect fetch of {url} failed: {reason}")]
    IndirectFetchFailed { url: String, reason: String },

    #[error("Upstream {url} returned status {status}")]
    UpstreamError { url: String, status: StatusCode },

    #[error("Upstream {url} unreachable: {source}")]
    UpstreamUnreachable {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(#[source] redis::RedisError),
}
