//! Database data source: a single-column equality lookup.
//!
//! Table and column names come from the descriptor and are re-checked
//! against `[A-Za-z0-9_]+` on every fetch before being quoted into SQL.
//! The identifier value is always a bound parameter.

use std::sync::Arc;

use bytes::Bytes;
use sqlx::Row;

use super::resolver::Resolver;
use crate::error::StratumError;
use crate::pool::{Dialect, DbPool, PoolRegistry};

pub struct DatabaseSource {
    registry: Arc<PoolRegistry>,
    dsn: String,
    table: String,
    id_column: String,
    value_column: String,
    resolver: Resolver,
}

/// True for names made only of ASCII letters, digits and underscores.
#[must_use]
pub fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Build `SELECT <value> FROM <table> WHERE <id> = <placeholder>`.
///
/// PostgreSQL compares the identifier column as text so that a bound
/// string matches integer and text keys alike.
pub fn lookup_query(
    dialect: Dialect,
    table: &str,
    id_column: &str,
    value_column: &str,
) -> Result<String, StratumError> {
    for name in [table, id_column, value_column] {
        if !is_safe_identifier(name) {
            return Err(StratumError::InvalidIdentifier(name.to_string()));
        }
    }

    let id = match dialect {
        Dialect::Postgres => format!("{}::text", dialect.quote(id_column)),
        Dialect::MySql | Dialect::Sqlite => dialect.quote(id_column),
    };

    Ok(format!(
        "SELECT {} FROM {} WHERE {} = {}",
        dialect.quote(value_column),
        dialect.quote(table),
        id,
        dialect.placeholder()
    ))
}

/// Read column 0 as bytes, falling back to text, then to integers and
/// floats rendered as decimal text. NULL reads as `None`. When nothing
/// fits, the error from the bytes attempt is returned.
macro_rules! column_bytes {
    ($row:expr) => {{
        let row = &$row;
        match row.try_get::<Option<Vec<u8>>, _>(0) {
            Ok(value) => Ok(value),
            Err(err) => row
                .try_get::<Option<String>, _>(0)
                .map(|value| value.map(String::into_bytes))
                .or_else(|_| column_text!(row, i64))
                .or_else(|_| column_text!(row, i32))
                .or_else(|_| column_text!(row, i16))
                .or_else(|_| column_text!(row, f64))
                .or_else(|_| column_text!(row, f32))
                .map_err(|_| err),
        }
    }};
}

macro_rules! column_text {
    ($row:expr, $ty:ty) => {
        $row.try_get::<Option<$ty>, _>(0)
            .map(|value| value.map(|n| n.to_string().into_bytes()))
    };
}

impl DatabaseSource {
    #[must_use]
    pub fn new(
        registry: Arc<PoolRegistry>,
        dsn: &str,
        table: &str,
        id_column: &str,
        value_column: &str,
        resolver: Resolver,
    ) -> Self {
        Self {
            registry,
            dsn: dsn.to_string(),
            table: table.to_string(),
            id_column: id_column.to_string(),
            value_column: value_column.to_string(),
            resolver,
        }
    }

    pub async fn fetch(&self, id: &str) -> Result<Option<Bytes>, StratumError> {
        // Guard against corrupted descriptors before touching the pool
        let dialect = Dialect::detect(&self.dsn)?;
        let sql = lookup_query(dialect, &self.table, &self.id_column, &self.value_column)?;

        let pool = self.registry.acquire(&self.dsn).await?;
        let Some(raw) = query_value(&pool, &sql, id).await? else {
            return Ok(None);
        };

        self.resolver.resolve(Bytes::from(raw)).await
    }
}

async fn query_value(pool: &DbPool, sql: &str, id: &str) -> Result<Option<Vec<u8>>, StratumError> {
    let value = match pool {
        DbPool::Postgres(pool) => {
            let row = sqlx::query(sql).bind(id).fetch_optional(pool).await;
            row.and_then(|row| row.map(|row| column_bytes!(row)).transpose())
        }
        DbPool::MySql(pool) => {
            let row = sqlx::query(sql).bind(id).fetch_optional(pool).await;
            row.and_then(|row| row.map(|row| column_bytes!(row)).transpose())
        }
        DbPool::Sqlite(pool) => {
            let row = sqlx::query(sql).bind(id).fetch_optional(pool).await;
            row.and_then(|row| row.map(|row| column_bytes!(row)).transpose())
        }
    };

    value
        .map(Option::flatten)
        .map_err(StratumError::QueryFailed)
}
