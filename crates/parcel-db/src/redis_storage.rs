//! Redis-compatible rate cache.
//!
//! | Operation | Command |
//! |-----------|---------|
//! | `save` | `SET key value EX ttl` |
//! | `save_no_expiry` | `SET key value KEEPTTL` |
//! | `get` | `GET key` |
//! | `delete` | `DEL key` |

use std::time::Duration;

use async_trait::async_trait;
use fred::prelude::*;
use parcel_core::{CacheError, TemporaryStorage};

use crate::error::DbError;

/// [`TemporaryStorage`] backed by a Redis-compatible server.
#[derive(Clone)]
pub struct RedisTemporaryStorage {
    client: Client,
}

impl RedisTemporaryStorage {
    /// Connect to the server at `url` (`redis://host:port` or
    /// `redis://host:port/db`).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Redis`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("Invalid Redis URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Redis");
        Ok(Self { client })
    }

    /// Close the connection.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Redis`] if the quit command fails.
    pub async fn close(&self) -> Result<(), DbError> {
        self.client.quit().await?;
        Ok(())
    }

    async fn set_with(&self, key: &str, value: &str, expire: Expiration) -> Result<(), DbError> {
        let _: () = self
            .client
            .set(key, value, Some(expire), None, false)
            .await?;
        Ok(())
    }
}

/// Whole seconds for `EX`, never zero (Redis rejects `EX 0`).
fn ttl_seconds(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1)
}

#[async_trait]
impl TemporaryStorage for RedisTemporaryStorage {
    async fn save(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.set_with(key, value, Expiration::EX(ttl_seconds(ttl)))
            .await
            .map_err(CacheError::from)
    }

    async fn save_no_expiry(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.set_with(key, value, Expiration::KEEPTTL)
            .await
            .map_err(CacheError::from)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let value: Option<String> = self
            .client
            .get(key)
            .await
            .map_err(|e| CacheError::from(DbError::from(e)))?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let _: u32 = self
            .client
            .del(key)
            .await
            .map_err(|e| CacheError::from(DbError::from(e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_rounds_down_but_never_to_zero() {
        assert_eq!(ttl_seconds(Duration::from_secs(3600)), 3600);
        assert_eq!(ttl_seconds(Duration::from_millis(1500)), 1);
        assert_eq!(ttl_seconds(Duration::from_millis(10)), 1);
        assert_eq!(ttl_seconds(Duration::from_secs(u64::MAX)), i64::MAX);
    }
}
