//! CacheStore port - TTL 付きの key-value キャッシュ（Redis または InMemory）
//!
//! 耐久性は要求しない。値は DurableStore から再構築できるものだけを置く。

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::CacheKey;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// `None` for a missing or expired entry.
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError>;

    /// Insert or replace; the entry is unreadable once `ttl` elapses.
    async fn set(&self, key: &CacheKey, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Returns whether an entry was present. Deleting a missing key is not an error.
    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError>;

    /// Delete every key starting with `prefix`; returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;

    /// Drop expired entries eagerly; returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, CacheError>;
}
