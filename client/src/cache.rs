// Time-boxed cache over a string key/value store. Entries carry the time they
// were written and are ignored once older than the TTL the reader asks for.
// Nothing is ever evicted here: a stale entry stays until the next successful
// write for its key replaces it.
use crate::errors::CacheError;
use crate::metrics_defs::{CACHE_HIT, CACHE_MISS};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::counter;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default time-to-live for cached resources
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Persistence for serialized cache entries, addressed by string key.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn write(&self, key: &str, value: String) -> Result<(), CacheError>;
}

pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct CacheEntry<T> {
    pub data: T,
    /// Write time in epoch milliseconds
    pub timestamp: u64,
}

impl<T> CacheEntry<T> {
    /// An entry is expired once its age is strictly greater than `ttl`.
    /// Entries stamped in the future count as fresh.
    pub fn is_expired(&self, now_millis: u64, ttl: Duration) -> bool {
        let age = now_millis.saturating_sub(self.timestamp);
        u128::from(age) > ttl.as_millis()
    }
}

#[derive(Clone)]
pub struct TimedCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
}

impl TimedCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        TimedCache { store, clock }
    }

    /// Returns the value stored under `key` if it is younger than `ttl`.
    /// Missing, unreadable and expired entries all read as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, ttl: Duration) -> Option<T> {
        let (value, reason) = match self.try_get::<T>(key, ttl).await {
            Ok(Lookup::Fresh(value)) => (Some(value), None),
            Ok(Lookup::Absent) => (None, Some("absent")),
            Ok(Lookup::Expired) => (None, Some("expired")),
            Err(e) => {
                tracing::warn!(key, error = %e, "Error reading from cache");
                (None, Some("unreadable"))
            }
        };

        match reason {
            None => counter!(CACHE_HIT, "key" => key.to_string()).increment(1),
            Some(reason) => {
                counter!(CACHE_MISS, "key" => key.to_string(), "reason" => reason).increment(1)
            }
        }
        value
    }

    /// Stores `data` under `key`, stamped with the current time. Failures are
    /// logged and otherwise ignored; the next read simply misses.
    pub async fn set<T: Serialize>(&self, key: &str, data: &T) {
        if let Err(e) = self.try_set(key, data).await {
            tracing::warn!(key, error = %e, "Error saving to cache");
        }
    }

    async fn try_get<T: DeserializeOwned>(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<Lookup<T>, CacheError> {
        let Some(raw) = self.store.read(key).await? else {
            return Ok(Lookup::Absent);
        };

        let entry: CacheEntry<T> = serde_json::from_str(&raw)?;
        if entry.is_expired(self.clock.now_millis(), ttl) {
            return Ok(Lookup::Expired);
        }
        Ok(Lookup::Fresh(entry.data))
    }

    async fn try_set<T: Serialize>(&self, key: &str, data: &T) -> Result<(), CacheError> {
        let entry = CacheEntry {
            data,
            timestamp: self.clock.now_millis(),
        };
        let raw = serde_json::to_string(&entry)?;
        self.store.write(key, raw).await
    }
}

enum Lookup<T> {
    Fresh(T),
    Absent,
    Expired,
}
