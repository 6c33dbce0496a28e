//! CacheAsideCoordinator - read-through と invalidate-on-write
//!
//! # 一貫性の範囲
//! キャッシュは DurableStore の値を TTL の範囲でだけ遅れて映す。
//!
//! 書き込み側は「DurableStore に commit してから `invalidate`」の順を守ること。
//! 逆順にすると、delete と commit の間に来た reader が古い値を
//! キャッシュへ書き戻してしまう。
//!
//! 順序を守っていても、commit 前に fetch した遅い reader が invalidate の後に
//! populate する窓は残る。その古い値は最大で TTL の間だけ読める。
//! 強い一貫性は提供しない（eventual consistency, bound = TTL）。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::CacheKey;
use crate::ports::{CacheStore, DurableError, DurableStore};

pub struct CacheAsideCoordinator<S: DurableStore> {
    cache: Arc<dyn CacheStore>,
    store: Arc<S>,
    ttl: Duration,
}

impl<S: DurableStore> CacheAsideCoordinator<S> {
    pub fn new(cache: Arc<dyn CacheStore>, store: Arc<S>, ttl: Duration) -> Self {
        Self { cache, store, ttl }
    }

    pub fn key(&self, id: &str) -> CacheKey {
        CacheKey::new(self.store.resource(), id)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Read through the cache.
    ///
    /// - hit: returned without touching the durable store
    /// - miss: loaded from the durable store and cached for `ttl`
    /// - not found: returned as `None` and *not* cached
    ///
    /// Cache failures never fail the read; the durable store is consulted
    /// directly instead. Only durable-store errors are returned.
    pub async fn read(&self, id: &str) -> Result<Option<S::Record>, DurableError> {
        let key = self.key(id);

        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<S::Record>(&raw) {
                Ok(record) => {
                    debug!(key = %key, "cache hit");
                    return Ok(Some(record));
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "undecodable cache entry, reloading");
                    self.evict(&key).await;
                }
            },
            Ok(None) => debug!(key = %key, "cache miss"),
            Err(e) => {
                warn!(key = %key, error = %e, "cache unavailable, bypassing");
                return self.store.fetch(id).await;
            }
        }

        let Some(record) = self.store.fetch(id).await? else {
            debug!(key = %key, "not found in durable store");
            return Ok(None);
        };

        match serde_json::to_string(&record) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(&key, raw, self.ttl).await {
                    warn!(key = %key, error = %e, "cache populate failed");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "record not cacheable"),
        }
        Ok(Some(record))
    }

    /// Drop the cached entry for `id`, whether or not one exists.
    ///
    /// Call only after the durable write has committed. A failed delete is
    /// logged; the stale entry then lives until its TTL runs out.
    pub async fn invalidate(&self, id: &str) {
        let key = self.key(id);
        self.evict(&key).await;
    }

    /// Drop every cached entry of this resource.
    pub async fn invalidate_all(&self) {
        let prefix = CacheKey::prefix(self.store.resource());
        match self.cache.delete_prefix(&prefix).await {
            Ok(removed) => debug!(prefix = %prefix, removed, "cache invalidated"),
            Err(e) => warn!(prefix = %prefix, error = %e, "bulk invalidate failed"),
        }
    }

    async fn evict(&self, key: &CacheKey) {
        match self.cache.delete(key).await {
            Ok(existed) => debug!(key = %key, existed, "cache invalidated"),
            Err(e) => warn!(key = %key, error = %e, "cache invalidate failed, entry expires with ttl"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryCacheStore, InMemoryRecordStore};
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Example {
        name: String,
    }

    fn example(name: &str) -> Example {
        Example {
            name: name.to_string(),
        }
    }

    struct Fixture {
        clock: Arc<FixedClock>,
        cache: Arc<InMemoryCacheStore>,
        store: Arc<InMemoryRecordStore<Example>>,
        coordinator: CacheAsideCoordinator<InMemoryRecordStore<Example>>,
    }

    const TTL: Duration = Duration::from_secs(3600);

    fn fixture() -> Fixture {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let cache = Arc::new(InMemoryCacheStore::new(clock.clone()));
        let store = Arc::new(InMemoryRecordStore::new("example"));
        let coordinator = CacheAsideCoordinator::new(cache.clone(), store.clone(), TTL);
        Fixture {
            clock,
            cache,
            store,
            coordinator,
        }
    }

    #[tokio::test]
    async fn miss_loads_then_hit_skips_durable_store() {
        let f = fixture();
        let id = f.store.create(example("a"));

        assert_eq!(f.coordinator.read(&id).await.unwrap(), Some(example("a")));
        assert_eq!(f.store.fetch_count(), 1);

        assert_eq!(f.coordinator.read(&id).await.unwrap(), Some(example("a")));
        assert_eq!(f.store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn not_found_is_not_cached() {
        let f = fixture();
        assert_eq!(f.coordinator.read("1").await.unwrap(), None);
        assert!(f.cache.is_empty());

        // Created after the miss; visible on the very next read.
        let id = f.store.create(example("late"));
        assert_eq!(id, "1");
        assert_eq!(f.coordinator.read(&id).await.unwrap(), Some(example("late")));
    }

    #[tokio::test]
    async fn invalidate_after_commit_serves_the_new_value() {
        let f = fixture();
        let id = f.store.create(example("v1"));
        f.coordinator.read(&id).await.unwrap();

        assert!(f.store.update(&id, example("v2")));
        f.coordinator.invalidate(&id).await;

        assert_eq!(f.coordinator.read(&id).await.unwrap(), Some(example("v2")));
        assert_eq!(f.store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn invalidate_after_delete_reports_not_found() {
        let f = fixture();
        let id = f.store.create(example("gone"));
        f.coordinator.read(&id).await.unwrap();

        assert!(f.store.delete(&id));
        f.coordinator.invalidate(&id).await;

        assert_eq!(f.coordinator.read(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalidate_missing_key_is_fine() {
        let f = fixture();
        f.coordinator.invalidate("404").await;
        assert!(f.cache.is_empty());
    }

    #[tokio::test]
    async fn ttl_expiry_triggers_reload() {
        let f = fixture();
        let id = f.store.create(example("v1"));
        f.coordinator.read(&id).await.unwrap();

        // Written without invalidate: the cache keeps serving v1 until the TTL.
        f.store.update(&id, example("v2"));
        f.clock.advance(TTL - Duration::from_secs(1));
        assert_eq!(f.coordinator.read(&id).await.unwrap(), Some(example("v1")));
        assert_eq!(f.store.fetch_count(), 1);

        f.clock.advance(Duration::from_secs(1));
        assert_eq!(f.coordinator.read(&id).await.unwrap(), Some(example("v2")));
        assert_eq!(f.store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn racing_stale_populate_is_bounded_by_ttl() {
        let f = fixture();
        let id = f.store.create(example("old"));
        let key = f.coordinator.key(&id);

        // A slow reader fetches before the writer commits...
        let stale = f.store.fetch(&id).await.unwrap().unwrap();

        // ...the writer commits and invalidates...
        f.store.update(&id, example("new"));
        f.coordinator.invalidate(&id).await;

        // ...and the slow reader populates afterwards.
        f.cache
            .set(&key, serde_json::to_string(&stale).unwrap(), TTL)
            .await
            .unwrap();

        assert_eq!(f.coordinator.read(&id).await.unwrap(), Some(example("old")));

        f.clock.advance(TTL);
        assert_eq!(f.coordinator.read(&id).await.unwrap(), Some(example("new")));
    }

    #[tokio::test]
    async fn cache_outage_bypasses_to_durable_store() {
        let f = fixture();
        let id = f.store.create(example("a"));
        f.cache.simulate_outage(true);

        assert_eq!(f.coordinator.read(&id).await.unwrap(), Some(example("a")));
        assert_eq!(f.coordinator.read(&id).await.unwrap(), Some(example("a")));
        assert_eq!(f.store.fetch_count(), 2);

        f.coordinator.invalidate(&id).await;
        f.coordinator.invalidate_all().await;
    }

    #[tokio::test]
    async fn undecodable_entry_is_treated_as_miss() {
        let f = fixture();
        let id = f.store.create(example("a"));
        let key = f.coordinator.key(&id);
        f.cache.set(&key, "not json".into(), TTL).await.unwrap();

        assert_eq!(f.coordinator.read(&id).await.unwrap(), Some(example("a")));
        assert_eq!(f.store.fetch_count(), 1);
        assert_eq!(
            f.cache.get(&key).await.unwrap().as_deref(),
            Some(r#"{"name":"a"}"#)
        );
    }

    #[tokio::test]
    async fn durable_error_is_returned() {
        let f = fixture();
        f.store.simulate_outage(true);
        assert!(matches!(
            f.coordinator.read("1").await,
            Err(DurableError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn invalidate_all_clears_the_resource() {
        let f = fixture();
        let a = f.store.create(example("a"));
        let b = f.store.create(example("b"));
        f.coordinator.read(&a).await.unwrap();
        f.coordinator.read(&b).await.unwrap();
        assert_eq!(f.cache.len(), 2);

        f.coordinator.invalidate_all().await;
        assert!(f.cache.is_empty());
    }
}
