//! Task record: envelope + lifecycle state.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskId;

/// Default attempt cap for a task type that does not declare its own.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskType(String);

impl TaskType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// TaskType + opaque payload, as handed over by a producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    task_type: TaskType,
    payload: serde_json::Value,
}

impl TaskEnvelope {
    pub fn new(task_type: TaskType, payload: serde_json::Value) -> Self {
        Self { task_type, payload }
    }

    pub fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}

/// Task lifecycle state.
///
/// State transitions:
/// - Pending -> Running -> Succeeded
/// - Pending -> Running -> RetryScheduled -> Running (loop until max_attempts)
/// - Pending -> Running -> Failed (terminal failure or retries exhausted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Submitted, eligible immediately.
    Pending,

    /// Held by exactly one worker.
    Running,

    /// Waiting for `next_eligible_at` after a transient failure.
    RetryScheduled,

    Succeeded,

    Failed,
}

impl TaskState {
    /// Terminal states are immutable.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

/// One recorded state change. `delay` is set only for `RetryScheduled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: TaskState,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "humantime_serde")]
    pub delay: Option<Duration>,
}

/// Single source of truth for a task inside a broker.
///
/// The broker mutates records only through these methods so that every
/// transition lands in `history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub envelope: TaskEnvelope,
    pub state: TaskState,

    /// Retries consumed so far. The first execution runs with attempt 0.
    pub attempt: u32,

    /// Total executions allowed, including the first one.
    pub max_attempts: u32,

    /// Lower bound on the next dequeue; only meaningful while Pending/RetryScheduled.
    pub next_eligible_at: Option<DateTime<Utc>>,

    pub last_error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub history: Vec<Transition>,
}

impl TaskRecord {
    pub fn new(
        task_id: TaskId,
        envelope: TaskEnvelope,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            envelope,
            state: TaskState::Pending,
            attempt: 0,
            max_attempts: max_attempts.max(1),
            next_eligible_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
            history: vec![Transition {
                state: TaskState::Pending,
                at: now,
                delay: None,
            }],
        }
    }

    /// Can a worker pick this task up at `now`?
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            TaskState::Pending | TaskState::RetryScheduled => {
                self.next_eligible_at.is_none_or(|at| at <= now)
            }
            _ => false,
        }
    }

    pub fn start_running(&mut self, now: DateTime<Utc>) {
        self.next_eligible_at = None;
        self.transition(TaskState::Running, now, None);
    }

    pub fn schedule_retry(&mut self, delay: Duration, error: String, now: DateTime<Utc>) {
        self.attempt += 1;
        self.last_error = Some(error);
        self.next_eligible_at = Some(deadline_after(now, delay));
        self.transition(TaskState::RetryScheduled, now, Some(delay));
    }

    pub fn mark_succeeded(&mut self, now: DateTime<Utc>) {
        self.transition(TaskState::Succeeded, now, None);
    }

    pub fn mark_failed(&mut self, error: String, now: DateTime<Utc>) {
        self.last_error = Some(error);
        self.transition(TaskState::Failed, now, None);
    }

    /// States visited so far, oldest first.
    pub fn states(&self) -> Vec<TaskState> {
        self.history.iter().map(|t| t.state).collect()
    }

    fn transition(&mut self, state: TaskState, now: DateTime<Utc>, delay: Option<Duration>) {
        self.state = state;
        self.updated_at = now;
        self.history.push(Transition {
            state,
            at: now,
            delay,
        });
    }
}

/// `now + delay`, saturating at the far future instead of panicking.
pub(crate) fn deadline_after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::TimeDelta::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
