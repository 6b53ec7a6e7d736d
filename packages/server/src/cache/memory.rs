use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CacheError, CacheStore};

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-process cache. Expired entries are dropped lazily on read.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        } else {
            return Ok(None);
        }

        self.entries.remove_if(key, |_, e| e.expires_at <= now);
        Ok(None)
    }

    async fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}
