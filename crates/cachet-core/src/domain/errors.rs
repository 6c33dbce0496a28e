//! Classification of execution failures.

use serde::{Deserialize, Serialize};

/// Why an execution attempt failed.
///
/// - `Transient`: recoverable (dependency timeout, etc.); retried under the policy.
/// - `Terminal`: the input is permanently invalid; retries are skipped.
/// - `Infrastructure`: a collaborator of the worker (result store, broker)
///   failed after the handler ran; retried like `Transient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Terminal,
    Infrastructure,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::Terminal)
    }
}
