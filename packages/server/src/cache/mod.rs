pub mod memory;
pub mod redis;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

pub use memory::MemoryCache;
pub use self::redis::RedisCache;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<::redis::RedisError> for CacheError {
    fn from(err: ::redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Byte-level key/value store with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Delete an entry. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// Typed access on top of [`CacheStore`].
/// Automatically implemented for every store.
#[async_trait]
pub trait CacheStoreExt: CacheStore {
    async fn get<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned + Send,
    {
        match self.get_raw(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError>
    where
        T: Serialize + Sync,
    {
        let bytes = serde_json::to_vec(value)?;
        self.set_raw(key, bytes, ttl).await
    }

    /// Return the cached value, or run `factory` and cache its result.
    ///
    /// A factory error is returned as-is and nothing is cached.
    async fn get_or_create<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        factory: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        E: From<CacheError> + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        if let Some(hit) = self.get::<T>(key).await? {
            return Ok(hit);
        }

        let value = factory().await?;
        self.set(key, &value, ttl).await?;
        Ok(value)
    }
}

impl<T: ?Sized + CacheStore> CacheStoreExt for T {}
