//! In-memory result store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::task::deadline_after;
use crate::domain::{ResultBody, TaskId, TaskResult};
use crate::ports::{Clock, ResultStore, ResultStoreError};

/// DashMap-backed `ResultStore`.
///
/// Results are stored as whole values and swapped on overwrite, so a
/// concurrent `get` observes either the previous result or the new one.
pub struct InMemoryResultStore {
    results: DashMap<TaskId, TaskResult>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
}

impl InMemoryResultStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            results: DashMap::new(),
            clock,
            available: AtomicBool::new(true),
        }
    }

    pub fn simulate_outage(&self, down: bool) {
        self.available.store(!down, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    fn check_available(&self) -> Result<(), ResultStoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ResultStoreError::Unavailable(
                "in-memory result store marked down".into(),
            ))
        }
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(
        &self,
        task_id: TaskId,
        body: ResultBody,
        ttl: Duration,
    ) -> Result<TaskResult, ResultStoreError> {
        self.check_available()?;
        let now = self.clock.now();
        let result = TaskResult::from_body(task_id, body, now, deadline_after(now, ttl));
        self.results.insert(task_id, result.clone());
        Ok(result)
    }

    async fn get(&self, task_id: TaskId) -> Result<Option<TaskResult>, ResultStoreError> {
        self.check_available()?;
        let now = self.clock.now();
        match self.results.get(&task_id) {
            None => return Ok(None),
            Some(result) if !result.is_expired(now) => return Ok(Some(result.clone())),
            Some(_) => {}
        }
        self.results.remove_if(&task_id, |_, r| r.is_expired(now));
        Ok(None)
    }

    async fn purge_expired(&self) -> Result<usize, ResultStoreError> {
        self.check_available()?;
        let now = self.clock.now();
        let before = self.results.len();
        self.results.retain(|_, r| !r.is_expired(now));
        Ok(before.saturating_sub(self.results.len()))
    }
}
