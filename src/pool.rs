//! Lazily-connected database pools keyed by connection string.
//!
//! [`PoolRegistry`] hands out one shared [`DbPool`] per distinct
//! connection string. The first caller for a string connects; every later
//! caller gets the same `Arc`. Lookups take a shared lock, and creation
//! takes the exclusive lock and re-checks before connecting, so two
//! racing first callers never connect twice. A failed connect leaves no
//! entry behind, so the next call retries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tokio::sync::RwLock;

use crate::error::StratumError;

/// SQL dialect family inferred from a connection string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// Infer the dialect from the connection-string shape.
    ///
    /// URL schemes select PostgreSQL, MySQL or SQLite. The host-parameter
    /// form `user:pass@tcp(host:port)/db` also selects MySQL.
    pub fn detect(dsn: &str) -> Result<Self, StratumError> {
        if dsn.starts_with("postgres://") || dsn.starts_with("postgresql://") {
            Ok(Self::Postgres)
        } else if dsn.starts_with("mysql://") || dsn.contains("@tcp(") {
            Ok(Self::MySql)
        } else if dsn.starts_with("sqlite:") {
            Ok(Self::Sqlite)
        } else {
            Err(StratumError::UnsupportedDialect)
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Quote an already-validated identifier.
    #[must_use]
    pub fn quote(self, identifier: &str) -> String {
        match self {
            Self::MySql => format!("`{identifier}`"),
            Self::Postgres | Self::Sqlite => format!("\"{identifier}\""),
        }
    }

    #[must_use]
    pub const fn placeholder(self) -> &'static str {
        match self {
            Self::Postgres => "$1",
            Self::MySql | Self::Sqlite => "?",
        }
    }
}

/// Rewrite a host-parameter MySQL DSN into the URL form the driver takes.
///
/// `user:pass@tcp(db:3306)/app?x=y` becomes `mysql://user:pass@db:3306/app?x=y`.
/// Strings already in URL form are returned unchanged.
#[must_use]
pub fn mysql_url(dsn: &str) -> String {
    let Some((credentials, rest)) = dsn.split_once("@tcp(") else {
        return dsn.to_string();
    };
    let Some((host, path)) = rest.split_once(')') else {
        return dsn.to_string();
    };
    if credentials.is_empty() {
        format!("mysql://{host}{path}")
    } else {
        format!("mysql://{credentials}@{host}{path}")
    }
}

/// One live, internally pooled database handle.
///
/// Cloning is not needed: the registry shares it behind an `Arc`, and the
/// sqlx pools inside already serve concurrent callers.
#[derive(Debug)]
pub enum DbPool {
    Postgres(PgPool),
    MySql(MySqlPool),
    Sqlite(SqlitePool),
}

impl DbPool {
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        match self {
            Self::Postgres(_) => Dialect::Postgres,
            Self::MySql(_) => Dialect::MySql,
            Self::Sqlite(_) => Dialect::Sqlite,
        }
    }

    async fn connect(dsn: &str, options: &PoolOptions) -> Result<Self, StratumError> {
        let dialect = Dialect::detect(dsn)?;
        let connect_failed = |source| StratumError::ConnectFailed {
            dialect: dialect.name(),
            source,
        };

        let pool = match dialect {
            Dialect::Postgres => PgPoolOptions::new()
                .max_connections(options.max_connections)
                .acquire_timeout(options.acquire_timeout)
                .connect(dsn)
                .await
                .map(Self::Postgres),
            Dialect::MySql => MySqlPoolOptions::new()
                .max_connections(options.max_connections)
                .acquire_timeout(options.acquire_timeout)
                .connect(&mysql_url(dsn))
                .await
                .map(Self::MySql),
            Dialect::Sqlite => SqlitePoolOptions::new()
                .max_connections(options.max_connections)
                .acquire_timeout(options.acquire_timeout)
                .connect(dsn)
                .await
                .map(Self::Sqlite),
        };

        pool.map_err(connect_failed)
    }

    pub async fn close(&self) {
        match self {
            Self::Postgres(pool) => pool.close().await,
            Self::MySql(pool) => pool.close().await,
            Self::Sqlite(pool) => pool.close().await,
        }
    }
}

/// Sizing applied to every pool the registry creates.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: RwLock<HashMap<String, Arc<DbPool>>>,
    options: PoolOptions,
    connect_attempts: AtomicU64,
}

impl PoolRegistry {
    #[must_use]
    pub fn new(options: PoolOptions) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            options,
            connect_attempts: AtomicU64::new(0),
        }
    }

    /// Return the shared pool for `dsn`, connecting on first use.
    pub async fn acquire(&self, dsn: &str) -> Result<Arc<DbPool>, StratumError> {
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(dsn) {
                return Ok(Arc::clone(pool));
            }
        }

        let mut pools = self.pools.write().await;
        if let Some(pool) = pools.get(dsn) {
            return Ok(Arc::clone(pool));
        }

        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
        let pool = Arc::new(DbPool::connect(dsn, &self.options).await?);
        tracing::info!(
            dialect = pool.dialect().name(),
            "database pool connected"
        );
        pools.insert(dsn.to_string(), Arc::clone(&pool));
        Ok(pool)
    }

    /// Number of connect attempts made so far, successful or not.
    #[must_use]
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.pools.read().await.len()
    }

    /// Close and forget every pool. Used at shutdown.
    pub async fn close_all(&self) {
        let drained: Vec<Arc<DbPool>> = {
            let mut pools = self.pools.write().await;
            pools.drain().map(|(_, pool)| pool).collect()
        };
        let count = drained.len();
        for pool in drained {
            pool.close().await;
        }
        tracing::info!(pools = count, "database pools closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_dialects() {
        assert_eq!(
            Dialect::detect("postgres://u:p@localhost/app").unwrap(),
            Dialect::Postgres
        );
        assert_eq!(
            Dialect::detect("postgresql://localhost/app").unwrap(),
            Dialect::Postgres
        );
        assert_eq!(
            Dialect::detect("user:pass@tcp(localhost:3306)/app").unwrap(),
            Dialect::MySql
        );
        assert_eq!(
            Dialect::detect("mysql://localhost/app").unwrap(),
            Dialect::MySql
        );
        assert_eq!(
            Dialect::detect("sqlite://data.db").unwrap(),
            Dialect::Sqlite
        );
    }

    #[test]
    fn unknown_shape_is_unsupported() {
        assert!(matches!(
            Dialect::detect("oracle://db/app"),
            Err(StratumError::UnsupportedDialect)
        ));
        assert!(matches!(
            Dialect::detect("localhost:5432"),
            Err(StratumError::UnsupportedDialect)
        ));
    }

    #[test]
    fn quoting_and_placeholders_per_dialect() {
        assert_eq!(Dialect::Postgres.quote("users"), "\"users\"");
        assert_eq!(Dialect::Sqlite.quote("users"), "\"users\"");
        assert_eq!(Dialect::MySql.quote("users"), "`users`");
        assert_eq!(Dialect::Postgres.placeholder(), "$1");
        assert_eq!(Dialect::MySql.placeholder(), "?");
        assert_eq!(Dialect::Sqlite.placeholder(), "?");
    }

    #[test]
    fn mysql_host_parameter_form_is_rewritten() {
        assert_eq!(
            mysql_url("root:secret@tcp(db:3306)/app?parseTime=true"),
            "mysql://root:secret@db:3306/app?parseTime=true"
        );
        assert_eq!(mysql_url("@tcp(db:3306)/app"), "mysql://db:3306/app");
        assert_eq!(mysql_url("mysql://db/app"), "mysql://db/app");
    }

    #[tokio::test]
    async fn unsupported_dialect_never_connects() {
        let registry = PoolRegistry::new(PoolOptions::default());
        let err = registry.acquire("redis://localhost").await.unwrap_err();
        assert!(matches!(err, StratumError::UnsupportedDialect));
        assert_eq!(registry.len().await, 0);
    }
}
