//! Task results and the retrieval-surface views built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Error,
}

/// What gets recorded for a finished task, before the store stamps times on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultBody {
    Success(serde_json::Value),
    Error(String),
}

/// Outcome of a finished task, owned by a `ResultStore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TaskResult {
    pub fn success(
        task_id: TaskId,
        value: serde_json::Value,
        recorded_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            status: ResultStatus::Success,
            result: Some(value),
            error: None,
            recorded_at,
            expires_at,
        }
    }

    pub fn error(
        task_id: TaskId,
        detail: impl Into<String>,
        recorded_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            status: ResultStatus::Error,
            result: None,
            error: Some(detail.into()),
            recorded_at,
            expires_at,
        }
    }

    pub fn from_body(
        task_id: TaskId,
        body: ResultBody,
        recorded_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        match body {
            ResultBody::Success(value) => Self::success(task_id, value, recorded_at, expires_at),
            ResultBody::Error(detail) => Self::error(task_id, detail, recorded_at, expires_at),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// `{status, result|error}` as returned to a caller polling for a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultView {
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<TaskResult> for ResultView {
    fn from(r: TaskResult) -> Self {
        Self {
            status: r.status,
            result: r.result,
            error: r.error,
        }
    }
}

/// Returned by the submission surface. `initial_status` is always `"queued"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub task_id: TaskId,
    pub initial_status: String,
}

impl Submission {
    pub fn queued(task_id: TaskId) -> Self {
        Self {
            task_id,
            initial_status: "queued".to_string(),
        }
    }
}
