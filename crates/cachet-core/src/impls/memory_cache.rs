//! InMemoryCacheStore - 開発用の TTL 付きキャッシュ
//!
//! 期限切れのエントリは読み出し時に消す（lazy expiry）。
//! `purge_expired` で一括掃除もできる。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::domain::CacheKey;
use crate::domain::task::deadline_after;
use crate::ports::{CacheError, CacheStore, Clock};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub struct InMemoryCacheStore {
    entries: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
}

impl InMemoryCacheStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            available: AtomicBool::new(true),
        }
    }

    /// Make every operation fail with `CacheError::Unavailable` (or succeed again).
    pub fn simulate_outage(&self, down: bool) {
        self.available.store(!down, Ordering::SeqCst);
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_available(&self) -> Result<(), CacheError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Unavailable("in-memory cache marked down".into()))
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        self.check_available()?;
        let now = self.clock.now();
        match self.entries.get(key.as_str()) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
        }
        // The read guard is gone here; removing under it would deadlock the shard.
        self.entries
            .remove_if(key.as_str(), |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn set(&self, key: &CacheKey, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.check_available()?;
        let expires_at = deadline_after(self.clock.now(), ttl);
        self.entries
            .insert(key.as_str().to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        self.check_available()?;
        Ok(self.entries.remove(key.as_str()).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        self.check_available()?;
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        Ok(keys
            .iter()
            .filter(|k| self.entries.remove(k.as_str()).is_some())
            .count())
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        self.check_available()?;
        let now = self.clock.now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().is_expired(now))
            .map(|e| e.key().clone())
            .collect();
        Ok(expired
            .iter()
            .filter(|k| {
                self.entries
                    .remove_if(k.as_str(), |_, entry| entry.is_expired(now))
                    .is_some()
            })
            .count())
    }
}
