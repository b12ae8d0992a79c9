//! Cache gateway: Redis-backed or disabled.
//!
//! [`CacheGateway::connect`] picks the variant at startup. Without a
//! configured Redis URL, or when the initial `PING` fails, the gateway
//! runs [`CacheGateway::Disabled`] and every lookup misses. Errors from a
//! live Redis surface as [`StratumError::CacheUnavailable`]; callers log
//! them and carry on as if the cache were empty.

use std::time::Duration;

use bytes::Bytes;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::error::StratumError;

pub enum CacheGateway {
    Redis(RedisCache),
    Disabled,
}

impl std::fmt::Debug for CacheGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

impl CacheGateway {
    /// Connect to Redis when a URL is given, falling back to `Disabled`.
    pub async fn connect(redis_url: Option<&str>) -> Self {
        let Some(url) = redis_url.filter(|u| !u.is_empty()) else {
            tracing::warn!("no Redis URL configured, caching is disabled");
            return Self::Disabled;
        };

        match RedisCache::connect(url).await {
            Ok(cache) => {
                tracing::info!("connected to Redis cache");
                Self::Redis(cache)
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not connect to Redis, caching is disabled");
                Self::Disabled
            }
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Redis(_) => "redis",
            Self::Disabled => "disabled",
        }
    }

    /// Look up a key. `Ok(None)` means absent, which is distinct from an
    /// empty stored value.
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>, StratumError> {
        match self {
            Self::Redis(cache) => cache.get(key).await,
            Self::Disabled => Ok(None),
        }
    }

    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StratumError> {
        match self {
            Self::Redis(cache) => cache.set(key, value, ttl).await,
            Self::Disabled => Ok(()),
        }
    }

    pub async fn close(&self) {
        if let Self::Redis(cache) = self {
            cache.close().await;
        }
    }
}

pub struct RedisCache {
    connection: MultiplexedConnection,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, StratumError> {
        let client = redis::Client::open(url).map_err(StratumError::CacheUnavailable)?;
        let mut connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(StratumError::CacheUnavailable)?;

        let () = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(StratumError::CacheUnavailable)?;

        Ok(Self { connection })
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StratumError> {
        // Multiplexed connections are cheap handles onto one socket
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(StratumError::CacheUnavailable)?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StratumError> {
        let mut conn = self.connection.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if !ttl.is_zero() {
            cmd.arg("PX").arg(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX));
        }
        let () = cmd
            .query_async(&mut conn)
            .await
            .map_err(StratumError::CacheUnavailable)?;
        Ok(())
    }

    async fn close(&self) {
        let mut conn = self.connection.clone();
        let result: redis::RedisResult<()> = redis::cmd("QUIT").query_async(&mut conn).await;
        match result {
            Ok(()) => tracing::info!("Redis connection closed"),
            Err(e) => tracing::debug!(error = %e, "Redis QUIT failed"),
        }
    }
}
