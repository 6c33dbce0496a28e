//! InMemoryRecordStore - DurableStore の開発用実装
//!
//! 書き込みは呼び出しが返った時点で commit 済みとみなす。
//! キャッシュの invalidate はその後に呼ぶこと。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::ports::{DurableError, DurableStore};

pub struct InMemoryRecordStore<T> {
    resource: String,
    records: RwLock<HashMap<String, T>>,
    next_id: AtomicU64,
    fetches: AtomicUsize,
    available: AtomicBool,
}

impl<T: Clone> InMemoryRecordStore<T> {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            records: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            fetches: AtomicUsize::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Insert under a freshly assigned numeric id.
    pub fn create(&self, record: T) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.records.write().insert(id.clone(), record);
        id
    }

    /// Replace an existing record. Returns false when `id` does not exist.
    pub fn update(&self, id: &str, record: T) -> bool {
        match self.records.write().get_mut(id) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    pub fn delete(&self, id: &str) -> bool {
        self.records.write().remove(id).is_some()
    }

    /// How many times `fetch` reached this store.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn simulate_outage(&self, down: bool) {
        self.available.store(!down, Ordering::SeqCst);
    }
}

#[async_trait]
impl<T> DurableStore for InMemoryRecordStore<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Record = T;

    fn resource(&self) -> &str {
        &self.resource
    }

    async fn fetch(&self, id: &str) -> Result<Option<T>, DurableError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(DurableError::Unavailable(format!("{} store marked down", self.resource)));
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.read().get(id).cloned())
    }
}
