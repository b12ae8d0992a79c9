//! Serde data structures for the Stratum configuration.
//!
//! Contains [`Config`] (the root), [`SourceDescriptor`] (one exposed
//! route), [`SourceConfig`] (database or API payload) and [`ApiAuth`].
//! Descriptors are built once at startup and never mutated afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const fn default_ttl() -> u64 {
    3600
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

fn is_default_ttl(v: &u64) -> bool {
    *v == default_ttl()
}

fn is_default_content_type(v: &str) -> bool {
    v == DEFAULT_CONTENT_TYPE
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub projects: Vec<SourceDescriptor>,
}

impl Config {
    /// Give every unnamed project the positional name `project_{n}`.
    pub fn assign_default_names(&mut self) {
        for (i, project) in self.projects.iter_mut().enumerate() {
            if project.name.is_empty() {
                project.name = format!("project_{}", i + 1);
            }
        }
    }

    #[must_use]
    pub fn count_by_kind(&self) -> (usize, usize) {
        self.projects
            .iter()
            .fold((0, 0), |(db, api), p| match p.source {
                SourceConfig::Database { .. } => (db + 1, api),
                SourceConfig::Api { .. } => (db, api + 1),
            })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceDescriptor {
    /// Unique key, also the cache-key namespace.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Route pattern with exactly one `{placeholder}`.
    pub route: String,

    /// Identifier name; must equal the route placeholder.
    pub id: String,

    #[serde(
        default = "default_content_type",
        skip_serializing_if = "is_default_content_type"
    )]
    pub content_type: String,

    /// Zero disables caching for this route.
    #[serde(default = "default_ttl", skip_serializing_if = "is_default_ttl")]
    pub cache_ttl_seconds: u64,

    pub source: SourceConfig,
}

impl SourceDescriptor {
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Column matched against the identifier for database sources.
    #[must_use]
    pub fn id_column(&self) -> &str {
        match &self.source {
            SourceConfig::Database {
                id_column: Some(column),
                ..
            } => column,
            _ => &self.id,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Database {
        dsn: String,
        table: String,
        /// Defaults to the descriptor's identifier name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id_column: Option<String>,
        column: String,
    },
    Api {
        endpoint: String,
        #[serde(default)]
        auth: ApiAuth,
    },
}

impl SourceConfig {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Database { .. } => "database",
            Self::Api { .. } => "api",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ApiAuth {
    #[default]
    None,
    Bearer {
        secret: String,
    },
    Header {
        header: String,
        secret: String,
    },
}
