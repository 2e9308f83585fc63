//! Best-effort Redis cache for the fetched rate
//!
//! The cache is probed once at startup; if Redis is unreachable the handle
//! is tagged disabled for the process lifetime and every operation behaves
//! as a miss. The bot never owns the cached entry's lifecycle: expiry is
//! enforced by Redis itself.

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{info, warn};

/// Single process-wide cache key for the USD rate
pub const RATE_KEY: &str = "usd_to_rub";

/// Lifetime of a cached rate, seconds
pub const RATE_TTL_SECS: u64 = 60;

/// Connected-or-disabled handle to the rate cache
pub struct RateCache {
    conn: Option<MultiplexedConnection>,
}

impl RateCache {
    /// Connects to Redis and verifies liveness with a PING.
    ///
    /// Never fails: on any error the cache is disabled for the process
    /// lifetime and the bot falls back to always fetching.
    pub async fn connect(url: &str) -> Self {
        match Self::try_connect(url).await {
            Ok(conn) => {
                info!("Rate cache connected to Redis.");
                Self { conn: Some(conn) }
            }
            Err(e) => {
                warn!("Redis unavailable, running without cache: {e}");
                Self { conn: None }
            }
        }
    }

    async fn try_connect(url: &str) -> Result<MultiplexedConnection, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(conn)
    }

    /// Handle that treats every operation as a cache miss
    #[must_use]
    pub const fn disabled() -> Self {
        Self { conn: None }
    }

    /// Whether the startup probe succeeded
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Returns the cached rate if present and unexpired.
    ///
    /// Read errors degrade to a miss.
    pub async fn get(&self) -> Option<f64> {
        let mut conn = self.conn.clone()?;
        let stored: Result<Option<f64>, redis::RedisError> = conn.get(RATE_KEY).await;
        match stored {
            Ok(value) => value,
            Err(e) => {
                warn!("Rate cache read failed: {e}");
                None
            }
        }
    }

    /// Stores the rate with the fixed expiry, overwriting any prior entry.
    ///
    /// Write errors are logged and swallowed.
    pub async fn set(&self, value: f64) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let written: Result<(), redis::RedisError> =
            conn.set_ex(RATE_KEY, value, RATE_TTL_SECS).await;
        if let Err(e) = written {
            warn!("Rate cache write failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bad_url_yields_disabled_handle() {
        let cache = RateCache::connect("not-a-redis-url").await;
        assert!(!cache.is_connected());
    }

    #[tokio::test]
    async fn test_disabled_handle_misses_and_ignores_writes() {
        let cache = RateCache::disabled();
        assert_eq!(cache.get().await, None);

        // A write must be a silent no-op
        cache.set(93.25).await;
        assert_eq!(cache.get().await, None);
    }
}
