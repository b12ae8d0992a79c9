//! Data sources: where a route's bytes come from.
//!
//! [`DataSource`] is a closed set of two variants. [`DataSource::from_descriptor`]
//! picks one from the descriptor's `source` block at startup, so an
//! unrecognized DSN shape or a broken auth header stops the process
//! before any request is served.

pub mod api;
pub mod database;
pub mod outbound;
pub mod resolver;

use std::sync::Arc;

use bytes::Bytes;

use crate::config::model::{SourceConfig, SourceDescriptor};
use crate::error::StratumError;
use crate::pool::{Dialect, PoolRegistry};

pub use api::ApiSource;
pub use database::DatabaseSource;
pub use outbound::Outbound;
pub use resolver::Resolver;

pub enum DataSource {
    Database(DatabaseSource),
    Api(ApiSource),
}

impl DataSource {
    pub fn from_descriptor(
        descriptor: &SourceDescriptor,
        registry: &Arc<PoolRegistry>,
        outbound: &Outbound,
    ) -> Result<Self, StratumError> {
        match &descriptor.source {
            SourceConfig::Database {
                dsn, table, column, ..
            } => {
                let dialect = Dialect::detect(dsn)?;
                tracing::debug!(
                    project = %descriptor.name,
                    dialect = dialect.name(),
                    table = %table,
                    "database source bound"
                );
                Ok(Self::Database(DatabaseSource::new(
                    Arc::clone(registry),
                    dsn,
                    table,
                    descriptor.id_column(),
                    column,
                    Resolver::new(outbound.clone()),
                )))
            }
            SourceConfig::Api { endpoint, auth } => Ok(Self::Api(ApiSource::new(
                &descriptor.name,
                endpoint,
                &descriptor.id,
                auth,
                outbound.clone(),
            )?)),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::Api(_) => "api",
        }
    }

    /// Fetch the bytes for `id`. `Ok(None)` is the not-found outcome.
    pub async fn fetch(&self, id: &str) -> Result<Option<Bytes>, StratumError> {
        match self {
            Self::Database(source) => source.fetch(id).await,
            Self::Api(source) => source.fetch(id).await,
        }
    }
}
