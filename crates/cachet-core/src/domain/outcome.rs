//! Outcome model: what a handler reports back to the worker.
//!
//! Handlers never signal retries through panics or error types; they return
//! one of three tagged variants and the worker turns that into a transition.

use serde::{Deserialize, Serialize};

use super::ErrorKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    /// Finished; the value becomes the stored result payload.
    Success(serde_json::Value),

    /// Recoverable failure, eligible for retry.
    Transient(String),

    /// Permanent failure, recorded verbatim and never retried.
    Terminal(String),
}

impl Outcome {
    /// Serialize `value` into a success outcome.
    ///
    /// A value that cannot be represented as JSON is reported as terminal:
    /// running the handler again would produce the same value.
    pub fn success<T: Serialize>(value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => Outcome::Success(v),
            Err(e) => Outcome::Terminal(format!("result encode: {e}")),
        }
    }

    pub fn transient(detail: impl Into<String>) -> Self {
        Outcome::Transient(detail.into())
    }

    pub fn terminal(detail: impl Into<String>) -> Self {
        Outcome::Terminal(detail.into())
    }

    /// `None` for success.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Transient(_) => Some(ErrorKind::Transient),
            Outcome::Terminal(_) => Some(ErrorKind::Terminal),
        }
    }
}
