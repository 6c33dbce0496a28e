//! AppContext - バックエンドへのハンドルをまとめたもの
//!
//! グローバルな client は持たない。構築時に明示的に渡す。

use std::sync::Arc;

use crate::impls::{InMemoryCacheStore, InMemoryResultStore, InMemoryTaskBroker};
use crate::ports::{CacheStore, Clock, ResultStore, SystemClock, TaskBroker};

#[derive(Clone)]
pub struct AppContext {
    pub cache: Arc<dyn CacheStore>,
    pub broker: Arc<dyn TaskBroker>,
    pub results: Arc<dyn ResultStore>,
    pub clock: Arc<dyn Clock>,
}

impl AppContext {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        broker: Arc<dyn TaskBroker>,
        results: Arc<dyn ResultStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            broker,
            results,
            clock,
        }
    }

    /// Every store in memory, sharing `clock`.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: Arc::new(InMemoryCacheStore::new(Arc::clone(&clock))),
            broker: Arc::new(InMemoryTaskBroker::new(Arc::clone(&clock))),
            results: Arc::new(InMemoryResultStore::new(Arc::clone(&clock))),
            clock,
        }
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::in_memory(Arc::new(SystemClock))
    }
}
