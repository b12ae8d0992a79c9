//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors such as malformed routes, placeholder/identifier mismatches,
//! duplicate names or routes, unrecognized DSNs, unusable API endpoints
//! and incomplete auth. Every problem is collected, so one run reports
//! them all. Table and column names are not checked here; the database
//! source re-checks them on every fetch.

use std::collections::HashSet;

use axum::http::{HeaderName, HeaderValue};
use url::Url;

use super::model::{ApiAuth, Config, SourceConfig, SourceDescriptor};
use crate::error::{StratumError, ValidationError};
use crate::gateway::routing::extract_placeholder;
use crate::pool::Dialect;

/// Validate an API endpoint template for the identifier `id`.
pub fn validate_endpoint(endpoint: &str, id: &str) -> Result<(), String> {
    if endpoint.is_empty() {
        return Err("endpoint cannot be empty".into());
    }
    let token = format!("{{{id}}}");
    if !endpoint.contains(&token) {
        return Err(format!("endpoint must contain the '{token}' placeholder"));
    }
    let sample = endpoint.replacen(&token, "sample", 1);
    match Url::parse(&sample) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme == "http" || scheme == "https" {
                Ok(())
            } else {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            }
        }
        Err(_) => Err(format!("'{endpoint}' is not a valid URL")),
    }
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen_names = HashSet::new();
    let mut seen_routes = HashSet::new();

    for project in &config.projects {
        let mut push = |field: &str, message: String, suggestion: Option<String>| {
            errors.push(ValidationError {
                project: project.name.clone(),
                field: field.into(),
                message,
                suggestion,
            });
        };

        if !seen_names.insert(project.name.as_str()) {
            push("name", "duplicate project name".into(), None);
        }
        if !seen_routes.insert(project.route.as_str()) {
            push("route", "duplicate route".into(), None);
        }

        if !project.route.starts_with('/') {
            push(
                "route",
                "route must start with '/'".into(),
                Some(format!("did you mean '/{}'?", project.route)),
            );
        }

        if project.id.is_empty() {
            push("id", "id cannot be empty".into(), None);
        }

        match extract_placeholder(&project.route) {
            Ok(placeholder) if placeholder != project.id => push(
                "id",
                format!(
                    "identifier '{}' does not match route placeholder '{placeholder}'",
                    project.id
                ),
                Some(format!("set id to '{placeholder}'")),
            ),
            Ok(_) => {}
            Err(StratumError::MalformedRoute { reason, .. }) => {
                push("route", reason.to_string(), None);
            }
            Err(e) => push("route", e.to_string(), None),
        }

        if HeaderValue::from_str(&project.content_type).is_err() {
            push(
                "content_type",
                format!("'{}' is not a valid header value", project.content_type),
                None,
            );
        }

        validate_source(project, &mut push);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_source<F>(project: &SourceDescriptor, push: &mut F)
where
    F: FnMut(&str, String, Option<String>),
{
    match &project.source {
        SourceConfig::Database {
            dsn, table, column, ..
        } => {
            if dsn.is_empty() {
                push("source.dsn", "dsn cannot be empty".into(), None);
            } else if Dialect::detect(dsn).is_err() {
                push(
                    "source.dsn",
                    "unrecognized connection string".into(),
                    Some(
                        "use postgres://, mysql://, user:pass@tcp(host:port)/db or sqlite:".into(),
                    ),
                );
            }
            if table.is_empty() {
                push("source.table", "table cannot be empty".into(), None);
            }
            if column.is_empty() {
                push("source.column", "column cannot be empty".into(), None);
            }
        }
        SourceConfig::Api { endpoint, auth } => {
            if let Err(msg) = validate_endpoint(endpoint, &project.id) {
                push("source.endpoint", msg, None);
            }
            match auth {
                ApiAuth::None => {}
                ApiAuth::Bearer { secret } => {
                    if secret.is_empty() {
                        push(
                            "source.auth.secret",
                            "bearer auth requires a secret".into(),
                            None,
                        );
                    }
                }
                ApiAuth::Header { header, secret } => {
                    if header.parse::<HeaderName>().is_err() {
                        push(
                            "source.auth.header",
                            format!("'{header}' is not a valid header name"),
                            None,
                        );
                    }
                    if secret.is_empty() {
                        push(
                            "source.auth.secret",
                            "header auth requires a secret".into(),
                            None,
                        );
                    }
                }
            }
        }
    }
}

#[must_use]
pub fn format_validation_report(label: &str, config: &Config) -> String {
    let (db, api) = config.count_by_kind();
    let mut lines = vec![format!(
        "  {} projects ({db} database, {api} api)\n",
        config.projects.len()
    )];

    for project in &config.projects {
        let target = match &project.source {
            SourceConfig::Database { table, column, .. } => {
                format!("database {table}.{column} by {}", project.id_column())
            }
            SourceConfig::Api { endpoint, .. } => format!("api {endpoint}"),
        };
        let ttl = if project.cache_ttl_seconds == 0 {
            "disabled".to_string()
        } else {
            format!("{}s", project.cache_ttl_seconds)
        };

        lines.push(format!("  {}  -> {} ({})", project.route, target, project.name));
        lines.push(format!("    content-type: {}", project.content_type));
        lines.push(format!("    cache ttl:    {ttl}"));
    }

    format!("{label} is valid\n{}", lines.join("\n"))
}
