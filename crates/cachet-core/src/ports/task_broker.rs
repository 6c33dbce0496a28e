//! TaskBroker port - 実行待ちタスクのキュー
//!
//! # 設計原則
//! - `dequeue` は取り出しと Running への遷移を 1 つの操作で行う
//!   （同じ task_id を 2 つの worker が同時に持つことはない）
//! - Running からの遷移は Running のときだけ受け付ける
//! - タスク間の順序は保証しない

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{QueueCounts, TaskEnvelope, TaskId, TaskRecord, TaskState};

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("invalid transition for {task_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        task_id: TaskId,
        from: TaskState,
        to: TaskState,
    },
}

#[async_trait]
pub trait TaskBroker: Send + Sync {
    /// Store a new task as Pending, eligible immediately.
    async fn enqueue(&self, envelope: TaskEnvelope, max_attempts: u32)
        -> Result<TaskId, BrokerError>;

    /// Running -> RetryScheduled, eligible again once `delay` has passed.
    /// Increments the retry counter.
    async fn schedule_retry(
        &self,
        task_id: TaskId,
        delay: Duration,
        error: String,
    ) -> Result<(), BrokerError>;

    /// Take one eligible task and mark it Running, atomically.
    /// `None` when nothing is eligible right now.
    async fn dequeue(&self) -> Result<Option<TaskRecord>, BrokerError>;

    /// Running -> Succeeded.
    async fn complete(&self, task_id: TaskId) -> Result<(), BrokerError>;

    /// Running -> Failed.
    async fn fail(&self, task_id: TaskId, error: String) -> Result<(), BrokerError>;

    /// Snapshot of a task, including its transition history.
    async fn get(&self, task_id: TaskId) -> Result<Option<TaskRecord>, BrokerError>;

    async fn counts(&self) -> Result<QueueCounts, BrokerError>;

    /// Park an idle worker until work may be available, for at most `timeout`.
    ///
    /// Spurious wake-ups are fine; callers always re-check with `dequeue`.
    async fn wait_for_work(&self, timeout: Duration) {
        tokio::time::sleep(timeout).await;
    }
}
