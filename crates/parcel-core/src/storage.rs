//! Rate cache contract.
//!
//! A string key-value store with optional per-key expiry. Values are opaque;
//! callers encode and decode them. Expiry is enforced by the backing store,
//! and each operation is atomic per key, so no client-side locking is needed.

use std::time::Duration;

use async_trait::async_trait;

/// Errors raised by a rate cache backend.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backing store rejected or failed the operation.
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Key-value store with optional expiry, used to cache exchange rates.
#[async_trait]
pub trait TemporaryStorage: Send + Sync {
    /// Store `value` at `key`, expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] if the write fails.
    async fn save(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Store `value` at `key` without setting an expiry.
    ///
    /// If the key already carries an expiry it is preserved; the value is
    /// refreshed either way.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] if the write fails.
    async fn save_no_expiry(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Read the value at `key`, or `None` if absent or expired.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] if the read fails.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Remove `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] if the delete fails.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}
