//! Environment-variable config source.
//!
//! Projects are declared as numbered groups, `PROJECT_1_*`, `PROJECT_2_*`,
//! and so on. Scanning stops at the first `n` without a
//! `PROJECT_{n}_ROUTE`. The lookup is injected so tests can supply a map
//! instead of mutating the process environment.

use super::model::{ApiAuth, Config, SourceConfig, SourceDescriptor, DEFAULT_CONTENT_TYPE};
use crate::error::StratumError;

const DEFAULT_TTL_SECONDS: u64 = 3600;

/// Build a [`Config`] from the real process environment.
pub fn load() -> Result<Config, StratumError> {
    load_from(|key| std::env::var(key).ok())
}

/// Build a [`Config`] from an arbitrary key lookup.
pub fn load_from<F>(lookup: F) -> Result<Config, StratumError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut projects = Vec::new();

    for n in 1.. {
        let var =
            |suffix: &str| lookup(&format!("PROJECT_{n}_{suffix}")).filter(|v| !v.is_empty());

        let Some(route) = var("ROUTE") else {
            break;
        };

        let cache_ttl_seconds = var("CACHE_TTL_SECONDS")
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(DEFAULT_TTL_SECONDS);

        let source_type = var("SOURCE_TYPE").unwrap_or_else(|| "database".into());
        let source = match source_type.as_str() {
            "database" => SourceConfig::Database {
                dsn: var("DB_DSN").unwrap_or_default(),
                table: var("TABLE").unwrap_or_default(),
                id_column: None,
                column: var("SERVE_COLUMN").unwrap_or_default(),
            },
            "api" => SourceConfig::Api {
                endpoint: var("API_ENDPOINT").unwrap_or_default(),
                auth: parse_auth(
                    n,
                    var("API_AUTH_TYPE"),
                    var("API_AUTH_SECRET"),
                    var("API_AUTH_HEADER_NAME"),
                )?,
            },
            other => {
                return Err(env_error(
                    n,
                    format!("unknown SOURCE_TYPE '{other}' (expected 'database' or 'api')"),
                ))
            }
        };

        projects.push(SourceDescriptor {
            name: format!("project_{n}"),
            route,
            id: var("ID_COLUMN").unwrap_or_default(),
            content_type: var("CONTENT_TYPE").unwrap_or_else(|| DEFAULT_CONTENT_TYPE.into()),
            cache_ttl_seconds,
            source,
        });
    }

    Ok(Config { projects })
}

fn parse_auth(
    n: usize,
    kind: Option<String>,
    secret: Option<String>,
    header: Option<String>,
) -> Result<ApiAuth, StratumError> {
    match kind.as_deref().unwrap_or("none") {
        "none" => Ok(ApiAuth::None),
        "bearer" => Ok(ApiAuth::Bearer {
            secret: secret.unwrap_or_default(),
        }),
        "header" => Ok(ApiAuth::Header {
            header: header.unwrap_or_default(),
            secret: secret.unwrap_or_default(),
        }),
        other => Err(env_error(
            n,
            format!("unknown API_AUTH_TYPE '{other}' (expected 'none', 'bearer' or 'header')"),
        )),
    }
}

fn env_error(n: usize, message: String) -> StratumError {
    StratumError::ConfigParse {
        path: format!("env::PROJECT_{n}"),
        source: message.into(),
    }
}
