//! Per-state task counts.

use serde::{Deserialize, Serialize};

/// Number of tasks per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub running: usize,
    pub retry_scheduled: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl QueueCounts {
    /// Tasks that have not reached a terminal state.
    pub fn in_flight(&self) -> usize {
        self.pending + self.running + self.retry_scheduled
    }

    pub fn total(&self) -> usize {
        self.in_flight() + self.succeeded + self.failed
    }
}
