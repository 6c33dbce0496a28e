//! ResultStore port - task_id ごとの実行結果（独自の TTL を持つ）

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{ResultBody, TaskId, TaskResult};

#[derive(Debug, thiserror::Error)]
pub enum ResultStoreError {
    #[error("result store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Record the outcome of `task_id`, readable until `ttl` elapses.
    ///
    /// A second put for the same id replaces the entry whole; readers see
    /// either the old or the new result, never a mix.
    async fn put(
        &self,
        task_id: TaskId,
        body: ResultBody,
        ttl: Duration,
    ) -> Result<TaskResult, ResultStoreError>;

    /// `None` both when the task has not finished and when its result expired.
    async fn get(&self, task_id: TaskId) -> Result<Option<TaskResult>, ResultStoreError>;

    async fn purge_expired(&self) -> Result<usize, ResultStoreError>;
}
