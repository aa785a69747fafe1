// libs/shared/database/src/kv.rs
// ==============================================================================
// KEY-VALUE STORE - SESSIONS, JOB MARKERS AND RESPONSE CACHE
// ==============================================================================

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum KvError {
    #[error("Key-value backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for KvError {
    fn from(err: redis::RedisError) -> Self {
        KvError::Backend(err.to_string())
    }
}

impl From<KvError> for AppError {
    fn from(err: KvError) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Stores `value`, replacing any previous one. `None` keeps it forever.
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<(), KvError>;

    /// Stores `value` only if the key is absent; returns whether it was stored.
    async fn set_nx(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool, KvError>;

    async fn delete(&self, key: &str) -> Result<(), KvError>;
}

// ==============================================================================
// IN-PROCESS BACKEND
// ==============================================================================

#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn expiry(ttl_seconds: Option<u64>) -> Option<Instant> {
        ttl_seconds.map(|ttl| Instant::now() + Duration::from_secs(ttl))
    }

    fn is_live(expires_at: &Option<Instant>) -> bool {
        expires_at.map_or(true, |at| at > Instant::now())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| Self::is_live(expires_at))
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<(), KvError> {
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires_at)| Self::is_live(expires_at));
        entries.insert(key.to_string(), (value.to_string(), Self::expiry(ttl_seconds)));
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool, KvError> {
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires_at)| Self::is_live(expires_at));
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), (value.to_string(), Self::expiry(Some(ttl_seconds))));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// ==============================================================================
// REDIS BACKEND
// ==============================================================================

pub struct RedisKeyValueStore {
    pool: Pool,
}

impl RedisKeyValueStore {
    pub async fn connect(redis_url: &str) -> Result<Self, KvError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| KvError::Backend(format!("Pool creation error: {}", e)))?;

        let store = Self { pool };

        // Test connection
        let mut conn = store.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis key-value store connected");

        Ok(store)
    }

    async fn connection(&self) -> Result<Connection, KvError> {
        self.pool
            .get()
            .await
            .map_err(|e| KvError::Backend(format!("Connection error: {}", e)))
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<(), KvError> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl_seconds {
            cmd.arg("EX").arg(ttl);
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool, KvError> {
        let mut conn = self.connection().await?;
        let stored: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;
        Ok(stored.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }
}

// ==============================================================================
// JSON CACHE HELPER
// ==============================================================================

/// Department list with doctor counts; dropped whenever doctors change.
pub const DEPARTMENTS_CACHE_KEY: &str = "departments";
pub const DEPARTMENTS_CACHE_TTL_SECONDS: u64 = 300;

/// Returns the cached JSON value under `key`, or runs `loader` and caches its
/// result for `ttl_seconds`. Cache failures fall back to the loader.
pub async fn cache_json<T, F, Fut>(
    kv: &dyn KeyValueStore,
    key: &str,
    ttl_seconds: u64,
    loader: F,
) -> Result<T, AppError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    match kv.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("Cache hit for {}", key);
                return Ok(value);
            }
            Err(e) => warn!("Discarding unreadable cache entry {}: {}", key, e),
        },
        Ok(None) => debug!("Cache miss for {}", key),
        Err(e) => warn!("Cache lookup for {} failed: {}", key, e),
    }

    let value = loader().await?;

    match serde_json::to_string(&value) {
        Ok(raw) => {
            if let Err(e) = kv.set(key, &raw, Some(ttl_seconds)).await {
                warn!("Failed to cache {}: {}", key, e);
            }
        }
        Err(e) => warn!("Failed to serialize {} for caching: {}", key, e),
    }

    Ok(value)
}
