//! Worker - dequeue → handle → 状態遷移 の 1 ステップ
//!
//! # フロー
//! 1. `dequeue` で 1 件取り出す（この時点で Running）
//! 2. Handler を実行して `Outcome` を得る
//! 3. 成功: 結果を書いてから Succeeded
//! 4. 失敗: RetryPolicy に判断させて RetryScheduled か、エラー結果を書いて Failed
//!
//! 結果の書き込みは状態遷移より先。Succeeded / Failed が見えた時点で
//! 結果は取得できる（TTL 内なら）。
//!
//! 状態遷移が `BrokerError::Unavailable` で失敗した場合は、指数バックオフで
//! `transition_attempts` 回まで試す。それでも駄目ならエラーを返す。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::domain::{Decision, ErrorKind, Outcome, ResultBody, RetryPolicy, TaskId, TaskRecord};
use crate::ports::{BrokerError, ResultStore, TaskBroker};
use crate::typed::TypedRegistry;

const DEFAULT_TRANSITION_ATTEMPTS: u32 = 5;
const DEFAULT_TRANSITION_BACKOFF: Duration = Duration::from_millis(200);

pub struct Worker {
    id: usize,
    broker: Arc<dyn TaskBroker>,
    results: Arc<dyn ResultStore>,
    registry: Arc<TypedRegistry>,
    policy: RetryPolicy,
    result_ttl: Duration,
    transition_attempts: u32,
    transition_backoff: RetryPolicy,
}

impl Worker {
    pub fn new(
        id: usize,
        broker: Arc<dyn TaskBroker>,
        results: Arc<dyn ResultStore>,
        registry: Arc<TypedRegistry>,
        policy: RetryPolicy,
        result_ttl: Duration,
    ) -> Self {
        Self {
            id,
            broker,
            results,
            registry,
            policy,
            result_ttl,
            transition_attempts: DEFAULT_TRANSITION_ATTEMPTS,
            transition_backoff: RetryPolicy::new(DEFAULT_TRANSITION_BACKOFF),
        }
    }

    /// How often to try a state transition while the broker is unavailable.
    /// `attempts` is clamped to at least 1.
    pub fn with_transition_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.transition_attempts = attempts.max(1);
        self.transition_backoff = RetryPolicy::new(backoff);
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn broker(&self) -> &Arc<dyn TaskBroker> {
        &self.broker
    }

    /// Run at most one task to its next state.
    ///
    /// `Ok(None)` when nothing was eligible. Broker errors are returned;
    /// handler failures never are, they become state transitions.
    pub async fn process_next(&self) -> Result<Option<TaskId>, BrokerError> {
        let Some(record) = self.broker.dequeue().await? else {
            return Ok(None);
        };
        let task_id = record.task_id;
        debug!(
            worker_id = self.id,
            task_id = %task_id,
            task_type = %record.envelope.task_type(),
            attempt = record.attempt,
            "task running"
        );

        match self.execute(&record).await {
            Outcome::Success(value) => {
                match self
                    .results
                    .put(task_id, ResultBody::Success(value), self.result_ttl)
                    .await
                {
                    Ok(_) => {
                        let broker = &*self.broker;
                        self.transition(task_id, move || broker.complete(task_id))
                            .await?;
                        info!(worker_id = self.id, task_id = %task_id, "task succeeded");
                    }
                    Err(e) => {
                        self.on_failure(&record, ErrorKind::Infrastructure, format!("result store: {e}"))
                            .await?;
                    }
                }
            }
            Outcome::Transient(detail) => {
                self.on_failure(&record, ErrorKind::Transient, detail).await?;
            }
            Outcome::Terminal(detail) => {
                self.on_failure(&record, ErrorKind::Terminal, detail).await?;
            }
        }
        Ok(Some(task_id))
    }

    async fn execute(&self, record: &TaskRecord) -> Outcome {
        let handler = match self.registry.resolve(record.envelope.task_type().as_str()) {
            Ok(handler) => handler,
            Err(e) => return Outcome::terminal(e.to_string()),
        };

        // A panicking handler must not take the worker down with the task stuck in Running.
        let payload = record.envelope.payload().clone();
        match tokio::spawn(async move { handler.handle_dyn(payload).await }).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => Outcome::terminal(format!("handler panicked: {e}")),
            Err(e) => Outcome::transient(format!("handler aborted: {e}")),
        }
    }

    async fn on_failure(
        &self,
        record: &TaskRecord,
        kind: ErrorKind,
        detail: String,
    ) -> Result<(), BrokerError> {
        let task_id = record.task_id;
        let broker = &*self.broker;
        match self.policy.decide(record.attempt, record.max_attempts, kind) {
            Decision::Retry { delay, reason } => {
                warn!(
                    worker_id = self.id,
                    task_id = %task_id,
                    kind = ?kind,
                    error = %detail,
                    delay = %humantime::format_duration(delay),
                    "{reason}"
                );
                let detail = &detail;
                self.transition(task_id, move || {
                    broker.schedule_retry(task_id, delay, detail.clone())
                })
                .await
            }
            Decision::GiveUp { reason } => {
                if let Err(e) = self
                    .results
                    .put(task_id, ResultBody::Error(detail.clone()), self.result_ttl)
                    .await
                {
                    error!(task_id = %task_id, error = %e, "error result could not be recorded");
                }
                {
                    let detail = &detail;
                    self.transition(task_id, move || broker.fail(task_id, detail.clone()))
                        .await?;
                }
                error!(
                    worker_id = self.id,
                    task_id = %task_id,
                    kind = ?kind,
                    error = %detail,
                    "task failed: {reason}"
                );
                Ok(())
            }
        }
    }

    /// Run a broker transition, trying again while the broker is unavailable.
    async fn transition<F, Fut>(&self, task_id: TaskId, op: F) -> Result<(), BrokerError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<(), BrokerError>>,
    {
        let mut tries = 0;
        loop {
            match op().await {
                Err(BrokerError::Unavailable(e)) if tries + 1 < self.transition_attempts => {
                    let wait = self.transition_backoff.backoff(tries);
                    warn!(
                        worker_id = self.id,
                        task_id = %task_id,
                        error = %e,
                        retry_in = %humantime::format_duration(wait),
                        "state transition failed"
                    );
                    tokio::time::sleep(wait).await;
                    tries += 1;
                }
                Err(e) => {
                    error!(
                        worker_id = self.id,
                        task_id = %task_id,
                        error = %e,
                        "state transition abandoned"
                    );
                    return Err(e);
                }
                Ok(()) => return Ok(()),
            }
        }
    }
}
