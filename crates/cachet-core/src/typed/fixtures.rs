//! Test tasks and handlers shared across modules.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Handler, Task};
use crate::domain::Outcome;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Echo {
    pub message: String,
}

impl Task for Echo {
    const TYPE: &'static str = "test.echo.v1";
}

pub struct EchoHandler;

#[async_trait]
impl Handler<Echo> for EchoHandler {
    async fn handle(&self, task: Echo) -> Outcome {
        Outcome::Success(json!({ "echo": task.message }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flaky {
    pub label: String,
}

impl Task for Flaky {
    const TYPE: &'static str = "test.flaky.v1";
}

/// Fails transiently for the first `failures` executions, then succeeds.
#[derive(Clone)]
pub struct FlakyHandler {
    failures: u32,
    calls: Arc<AtomicU32>,
}

impl FlakyHandler {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Handler<Flaky> for FlakyHandler {
    async fn handle(&self, task: Flaky) -> Outcome {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            Outcome::transient(format!("flaky failure #{}", n + 1))
        } else {
            Outcome::Success(json!({ "label": task.label, "calls": n + 1 }))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broken {
    pub reason: String,
}

impl Task for Broken {
    const TYPE: &'static str = "test.broken.v1";
}

/// Always fails terminally with the payload's reason.
#[derive(Clone, Default)]
pub struct BrokenHandler {
    calls: Arc<AtomicU32>,
}

impl BrokenHandler {
    pub fn calls(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Handler<Broken> for BrokenHandler {
    async fn handle(&self, task: Broken) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Outcome::terminal(task.reason)
    }
}
