use crate::errors::Result;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Cache TTL constants (in seconds)
pub mod ttl {
    pub const SECURITY_CODE: u64 = 300; // 5 minutes
}

/// Cache key prefixes
pub mod keys {
    pub const SECURITY_CODE: &str = "sc";

    pub fn security_code(mobile: &str) -> String {
        format!("{}_{}", SECURITY_CODE, mobile)
    }
}

/// Short-lived verification codes keyed by mobile number.
#[async_trait]
pub trait CodeCache: Send + Sync {
    async fn put(&self, key: &str, code: &str, ttl_secs: u64) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct RedisCodeCache {
    redis: ConnectionManager,
}

impl RedisCodeCache {
    pub fn new(redis: ConnectionManager) -> Self {
        RedisCodeCache { redis }
    }
}

#[async_trait]
impl CodeCache for RedisCodeCache {
    async fn put(&self, key: &str, code: &str, ttl_secs: u64) -> Result<()> {
        let _: () = self.redis.clone().set_ex(key, code, ttl_secs).await?;
        debug!(key, "cached security code");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = self.redis.clone().get(key).await?;
        Ok(value)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _: () = self.redis.clone().del(key).await?;
        Ok(())
    }
}

/// In-process stand-in for Redis, honouring expiry.
#[derive(Default)]
pub struct MemoryCodeCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryCodeCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CodeCache for MemoryCodeCache {
    async fn put(&self, key: &str, code: &str, ttl_secs: u64) -> Result<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries
            .write()
            .await
            .insert(key.to_string(), (code.to_string(), expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(code, _)| code.clone()))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_code_key() {
        assert_eq!(keys::security_code("13800000000"), "sc_13800000000");
    }

    #[tokio::test]
    async fn test_memory_cache_expiry() {
        let cache = MemoryCodeCache::new();
        cache.put("sc_1", "1234", 300).await.unwrap();
        assert_eq!(cache.get("sc_1").await.unwrap().as_deref(), Some("1234"));

        cache.put("sc_2", "5678", 0).await.unwrap();
        assert_eq!(cache.get("sc_2").await.unwrap(), None);

        cache.remove("sc_1").await.unwrap();
        assert_eq!(cache.get("sc_1").await.unwrap(), None);
    }
}
