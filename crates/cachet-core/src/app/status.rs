//! Status - 運用向けのスナップショット
//!
//! 詰まりの調査用。値はクエリ時点のもので、すぐに古くなる。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{TaskId, TaskRecord, TaskState};

pub use crate::domain::QueueCounts;

/// Lifecycle view of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub task_type: String,
    pub state: TaskState,
    /// Retries consumed so far.
    pub attempt: u32,
    pub max_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_eligible_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&TaskRecord> for TaskStatus {
    fn from(record: &TaskRecord) -> Self {
        Self {
            task_id: record.task_id,
            task_type: record.envelope.task_type().as_str().to_string(),
            state: record.state,
            attempt: record.attempt,
            max_attempts: record.max_attempts,
            next_eligible_at: record.next_eligible_at,
            last_error: record.last_error.clone(),
            updated_at: record.updated_at,
        }
    }
}
