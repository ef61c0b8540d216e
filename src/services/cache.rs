//! Ephemeral key/value store with per-key TTL.
//!
//! Every multi-step auth flow (pending signup, OTP, reset token, refresh
//! tracking, rate-limit markers) is built on these three operations. The
//! store never interprets the payloads it holds.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::errors::{AppError, Result};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Store a value under a key; the entry vanishes after `ttl_secs`.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// Fetch a value; `None` once expired or deleted.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn del(&self, key: &str) -> Result<()>;
}

/// Redis-backed store; production path.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::configuration(format!("invalid REDIS_URL: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::cache(e.to_string()))?;
        let _: () = conn
            .set_ex(key, value, ttl_secs)
            .await
            .map_err(|e| AppError::cache(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::cache(e.to_string()))?;
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| AppError::cache(e.to_string()))?;
        Ok(value)
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::cache(e.to_string()))?;
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| AppError::cache(e.to_string()))?;
        Ok(())
    }
}

/// In-process store used when `REDIS_URL` is absent (local development)
/// and as the deterministic substrate for tests. Entries expire lazily
/// on read; a single mutex makes per-key operations linearizable.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((value, deadline)) if *deadline > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete_round_trip() {
        let cache = MemoryCache::new();

        cache.set_ex("otp:a@x.com", "123456", 300).await.unwrap();
        assert_eq!(
            cache.get("otp:a@x.com").await.unwrap(),
            Some("123456".to_string())
        );

        cache.del("otp:a@x.com").await.unwrap();
        assert_eq!(cache.get("otp:a@x.com").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_vanish_after_ttl() {
        let cache = MemoryCache::new();
        cache.set_ex("verify:tok", "payload", 900).await.unwrap();

        tokio::time::advance(Duration::from_secs(899)).await;
        assert!(cache.get("verify:tok").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("verify:tok").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_resets_ttl() {
        let cache = MemoryCache::new();
        cache.set_ex("k", "old", 60).await.unwrap();

        tokio::time::advance(Duration::from_secs(50)).await;
        cache.set_ex("k", "new", 60).await.unwrap();

        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(cache.get("k").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn deleting_missing_key_is_fine() {
        let cache = MemoryCache::new();
        cache.del("nope").await.unwrap();
    }
}
