// libs/shared/database/src/store.rs
//
// Ephemeral key-value state with per-key TTL. OTP challenges and
// failure counters live here, never in process globals; the gate is
// handed a store so tests and redis-less deployments swap the backend.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use tracing::{debug, info};

use crate::rest::DbError;

#[async_trait]
pub trait EphemeralStore: Send + Sync {
    /// Atomically store `value` under `key` unless a live entry exists.
    /// Returns false when the key was already present.
    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<bool, DbError>;

    async fn fetch(&self, key: &str) -> Result<Option<String>, DbError>;

    async fn remove(&self, key: &str) -> Result<(), DbError>;

    /// Increment the integer under `key`, creating it at 1 when absent.
    /// The TTL is refreshed on every call. Returns the new count.
    async fn increment(&self, key: &str, ttl_seconds: u64) -> Result<i64, DbError>;
}

pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub async fn new(redis_url: &str) -> Result<Self, DbError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| DbError::Store(format!("failed to create redis pool: {}", e)))?;

        // Test connection
        let mut conn = pool
            .get()
            .await
            .map_err(|e| DbError::Store(format!("failed to connect to redis: {}", e)))?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| DbError::Store(e.to_string()))?;

        info!("Redis ephemeral store initialized successfully");
        Ok(Self { pool })
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, DbError> {
        self.pool
            .get()
            .await
            .map_err(|e| DbError::Store(format!("redis connection error: {}", e)))
    }
}

#[async_trait]
impl EphemeralStore for RedisStore {
    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<bool, DbError> {
        let mut conn = self.connection().await?;

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| DbError::Store(e.to_string()))?;

        Ok(reply.is_some())
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>, DbError> {
        let mut conn = self.connection().await?;

        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| DbError::Store(e.to_string()))?;

        Ok(value)
    }

    async fn remove(&self, key: &str) -> Result<(), DbError> {
        let mut conn = self.connection().await?;

        let _: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| DbError::Store(e.to_string()))?;

        Ok(())
    }

    async fn increment(&self, key: &str, ttl_seconds: u64) -> Result<i64, DbError> {
        let mut conn = self.connection().await?;

        let count: i64 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| DbError::Store(e.to_string()))?;

        let _: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| DbError::Store(e.to_string()))?;

        Ok(count)
    }
}

struct MemoryEntry {
    value: String,
    expires_at: u64,
}

/// Mutex-serialized store backed by a HashMap. Stands in for redis in
/// single-process deployments and gives tests a clock they can move.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    started: Instant,
    offset_seconds: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            started: Instant::now(),
            offset_seconds: AtomicU64::new(0),
        }
    }

    /// Move the store's clock forward without waiting. Entries whose
    /// TTL has passed behave exactly as if they had expired naturally.
    pub fn advance(&self, seconds: u64) {
        self.offset_seconds.fetch_add(seconds, Ordering::SeqCst);
        debug!("memory store clock advanced by {}s", seconds);
    }

    fn now_seconds(&self) -> u64 {
        self.started.elapsed().as_secs() + self.offset_seconds.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EphemeralStore for MemoryStore {
    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<bool, DbError> {
        let now = self.now_seconds();
        let mut entries = self.entries.lock().unwrap();

        if let Some(existing) = entries.get(key) {
            if existing.expires_at > now {
                return Ok(false);
            }
        }

        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: now + ttl_seconds,
            },
        );
        Ok(true)
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>, DbError> {
        let now = self.now_seconds();
        let entries = self.entries.lock().unwrap();

        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone()))
    }

    async fn remove(&self, key: &str) -> Result<(), DbError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn increment(&self, key: &str, ttl_seconds: u64) -> Result<i64, DbError> {
        let now = self.now_seconds();
        let mut entries = self.entries.lock().unwrap();

        let count = entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.value.parse::<i64>().ok())
            .unwrap_or(0)
            + 1;

        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: count.to_string(),
                expires_at: now + ttl_seconds,
            },
        );
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_if_absent_blocks_live_keys_only() {
        let store = MemoryStore::new();

        assert!(store.put_if_absent("k", "a", 60).await.unwrap());
        assert!(!store.put_if_absent("k", "b", 60).await.unwrap());
        assert_eq!(store.fetch("k").await.unwrap(), Some("a".to_string()));

        store.advance(61);
        assert_eq!(store.fetch("k").await.unwrap(), None);
        assert!(store.put_if_absent("k", "b", 60).await.unwrap());
    }

    #[tokio::test]
    async fn increment_refreshes_ttl_and_restarts_after_expiry() {
        let store = MemoryStore::new();

        assert_eq!(store.increment("n", 300).await.unwrap(), 1);
        store.advance(200);
        assert_eq!(store.increment("n", 300).await.unwrap(), 2);

        // The second increment refreshed the TTL, so 200s later the
        // counter is still live.
        store.advance(200);
        assert_eq!(store.increment("n", 300).await.unwrap(), 3);

        store.advance(301);
        assert_eq!(store.increment("n", 300).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn remove_deletes_immediately() {
        let store = MemoryStore::new();

        store.put_if_absent("k", "v", 60).await.unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.fetch("k").await.unwrap(), None);
    }
}
