//! Example tasks run by `cachet demo`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cachet_core::{Handler, Outcome, Task};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessMessage {
    pub message: String,
}

impl Task for ProcessMessage {
    const TYPE: &'static str = "examples.process_message.v1";
    // First run plus three retries.
    const MAX_ATTEMPTS: u32 = 4;
}

pub struct ProcessMessageHandler {
    pub work: Duration,
}

#[async_trait]
impl Handler<ProcessMessage> for ProcessMessageHandler {
    async fn handle(&self, task: ProcessMessage) -> Outcome {
        tokio::time::sleep(self.work).await;
        Outcome::Success(json!({
            "status": "success",
            "result": format!("Processed: {}", task.message),
            "message": task.message,
        }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEmail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl Task for SendEmail {
    const TYPE: &'static str = "examples.send_email.v1";
}

#[derive(Debug, Serialize)]
pub struct EmailReceipt {
    pub status: &'static str,
    pub recipient: String,
    pub subject: String,
}

/// Simulated delivery. An address without `@` can never be delivered.
pub struct SendEmailHandler {
    pub work: Duration,
}

#[async_trait]
impl Handler<SendEmail> for SendEmailHandler {
    async fn handle(&self, task: SendEmail) -> Outcome {
        if !task.recipient.contains('@') {
            return Outcome::terminal(format!("invalid recipient '{}'", task.recipient));
        }
        tokio::time::sleep(self.work).await;
        Outcome::success(EmailReceipt {
            status: "sent",
            recipient: task.recipient,
            subject: task.subject,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flaky {
    pub label: String,
}

impl Task for Flaky {
    const TYPE: &'static str = "examples.flaky.v1";
}

/// Fails transiently `failures` times in total, then succeeds.
pub struct FlakyHandler {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyHandler {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Handler<Flaky> for FlakyHandler {
    async fn handle(&self, task: Flaky) -> Outcome {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.failures {
            Outcome::transient(format!("upstream timeout ({n}/{})", self.failures))
        } else {
            Outcome::Success(json!({ "label": task.label, "attempts": n }))
        }
    }
}
