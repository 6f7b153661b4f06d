//! Storage layer: key-value backends behind a common trait.
//!
//! The task API only needs hash and set primitives, so that is all a backend has to provide.
//! `RedisStore` is the production backend; `MemoryStore` keeps everything in process and is used
//! for tests and `--memory` runs.

use crate::store::StoreError;
use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use eyre::{Context, Result, eyre};
use redis::AsyncCommands;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Default number of reconnect attempts before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Backoff grows by this much per attempt.
const DEFAULT_RETRY_STEP_MS: u64 = 100;

/// Upper bound on a single backoff delay.
const DEFAULT_MAX_DELAY_MS: u64 = 3000;

/// Hash and set operations the task API is built on.
///
/// No operation is atomic with any other; callers that issue several calls get no isolation.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// All field/value pairs of a hash. Missing hashes are empty.
    async fn hash_get_all(&self, table: &str) -> Result<HashMap<String, String>>;

    /// One field of a hash.
    async fn hash_get(&self, table: &str, key: &str) -> Result<Option<String>>;

    /// Set one field of a hash, overwriting any previous value.
    async fn hash_set(&self, table: &str, key: &str, value: &str) -> Result<()>;

    /// Remove one field of a hash. Returns whether the field existed.
    async fn hash_delete(&self, table: &str, key: &str) -> Result<bool>;

    /// Add a member to a set. Adding an existing member is a no-op.
    async fn set_add(&self, set: &str, member: &str) -> Result<()>;

    /// All members of a set, in no particular order.
    async fn set_members(&self, set: &str) -> Result<Vec<String>>;

    /// Check the backend is reachable.
    async fn ping(&self) -> Result<()>;
}

/// Linear backoff with a cap, bounded by a retry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,

    /// Delay added per attempt
    pub step: Duration,

    /// Longest single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            step: Duration::from_millis(DEFAULT_RETRY_STEP_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Policy with the default backoff and the given retry count.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), or `None` once retries are exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }
        Some(self.step.saturating_mul(attempt).min(self.max_delay))
    }
}

/// Redis backend using a `deadpool-redis` connection pool.
///
/// Broken connections are dropped by the pool and re-established on the next checkout, so only
/// the request that hit the failure sees an error.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("status", &self.pool.status()).finish()
    }
}

impl RedisStore {
    /// Build a pool for `url` without touching the network.
    pub fn new(url: &str) -> Result<Self> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .context("Failed to create Redis connection pool")?;
        Ok(Self { pool })
    }

    /// Build a pool and wait until Redis answers, retrying under `policy`.
    ///
    /// Fails with `StoreError::Connection` once the retries are used up.
    pub async fn connect(url: &str, policy: &RetryPolicy) -> Result<Self> {
        let store = Self::new(url)?;
        let mut attempt = 0;

        loop {
            match store.ping().await {
                Ok(()) => {
                    log::info!("Connected to Redis at {}", redact_url(url));
                    return Ok(store);
                }
                Err(e) => {
                    attempt += 1;
                    match policy.delay_for(attempt) {
                        Some(delay) => {
                            log::warn!(
                                "Redis not reachable (attempt {}/{}): {}; retrying in {}ms",
                                attempt,
                                policy.max_retries,
                                e,
                                delay.as_millis()
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            return Err(eyre!(StoreError::Connection {
                                attempts: attempt,
                                message: format!("{:#}", e),
                            }));
                        }
                    }
                }
            }
        }
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| eyre!(StoreError::Unavailable(e.to_string())))
    }
}

/// Classify a Redis error: transport failures mean the store is unavailable.
fn redis_error(e: redis::RedisError) -> eyre::Report {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
        eyre!(StoreError::Unavailable(e.to_string()))
    } else {
        eyre!(StoreError::Backend(e.to_string()))
    }
}

/// Strip credentials from a connection URL before it is logged.
pub fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn hash_get_all(&self, table: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.connection().await?;
        let entries: HashMap<String, String> = conn.hgetall(table).await.map_err(redis_error)?;
        Ok(entries)
    }

    async fn hash_get(&self, table: &str, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.hget(table, key).await.map_err(redis_error)?;
        Ok(value)
    }

    async fn hash_set(&self, table: &str, key: &str, value: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.hset(table, key, value).await.map_err(redis_error)?;
        Ok(())
    }

    async fn hash_delete(&self, table: &str, key: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn.hdel(table, key).await.map_err(redis_error)?;
        Ok(removed > 0)
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.sadd(set, member).await.map_err(redis_error)?;
        Ok(())
    }

    async fn set_members(&self, set: &str) -> Result<Vec<String>> {
        let mut conn = self.connection().await?;
        let members: Vec<String> = conn.smembers(set).await.map_err(redis_error)?;
        Ok(members)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await.map_err(redis_error)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryData {
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, HashSet<String>>,
}

/// In-process backend. Data lives as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<MemoryData>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations that changed stored data so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn hash_get_all(&self, table: &str) -> Result<HashMap<String, String>> {
        let data = self.data.lock().await;
        Ok(data.hashes.get(table).cloned().unwrap_or_default())
    }

    async fn hash_get(&self, table: &str, key: &str) -> Result<Option<String>> {
        let data = self.data.lock().await;
        Ok(data.hashes.get(table).and_then(|h| h.get(key)).cloned())
    }

    async fn hash_set(&self, table: &str, key: &str, value: &str) -> Result<()> {
        let mut data = self.data.lock().await;
        data.hashes
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.record_write();
        Ok(())
    }

    async fn hash_delete(&self, table: &str, key: &str) -> Result<bool> {
        let mut data = self.data.lock().await;
        let removed = data
            .hashes
            .get_mut(table)
            .map(|h| h.remove(key).is_some())
            .unwrap_or(false);
        if removed {
            self.record_write();
        }
        Ok(removed)
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<()> {
        let mut data = self.data.lock().await;
        if data.sets.entry(set.to_string()).or_default().insert(member.to_string()) {
            self.record_write();
        }
        Ok(())
    }

    async fn set_members(&self, set: &str) -> Result<Vec<String>> {
        let data = self.data.lock().await;
        Ok(data
            .sets
            .get(set)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
