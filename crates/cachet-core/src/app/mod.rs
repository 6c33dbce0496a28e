//! App - アプリケーション層
//!
//! ports を組み合わせて、提出・結果取得・cache-aside・worker の起動を提供する。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: 構築とワイヤリング（起動時検証つき）
//! - **CacheAsideCoordinator**: read-through / invalidate-on-write
//! - **Worker / WorkerPool**: dequeue → handle → 状態遷移
//! - **Sweeper**: 期限切れエントリの掃除

pub mod builder;
pub mod cache_aside;
pub mod context;
pub mod gc_loop;
pub mod status;
pub mod worker_loop;
pub mod worker_pool;

use std::sync::Arc;

use tracing::info;

use crate::config::Settings;
use crate::domain::{ResultView, Submission, TaskEnvelope, TaskId, TaskState, TaskType};
use crate::ports::{BrokerError, DurableStore, ResultStoreError};
use crate::typed::{Task, TypedRegistry};

pub use self::builder::{AppBuilder, BuildError};
pub use self::cache_aside::CacheAsideCoordinator;
pub use self::context::AppContext;
pub use self::gc_loop::{SweepReport, Sweeper, SweeperHandle};
pub use self::status::{QueueCounts, TaskStatus};
pub use self::worker_loop::Worker;
pub use self::worker_pool::WorkerPool;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No handler registered for task type '{0}'")]
    UnknownTaskType(String),

    #[error("payload encode failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("submission failed: {0}")]
    Broker(#[from] BrokerError),

    #[error("result lookup failed: {0}")]
    Results(#[from] ResultStoreError),
}

pub struct App {
    registry: Arc<TypedRegistry>,
    context: AppContext,
    settings: Settings,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    pub fn registry(&self) -> &TypedRegistry {
        &self.registry
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Queue a typed task. Handler failures never surface here.
    pub async fn submit<T: Task>(&self, task: &T) -> Result<Submission, AppError> {
        if self.registry.get(T::TYPE).is_none() {
            return Err(AppError::UnknownTaskType(T::TYPE.to_string()));
        }
        let payload = serde_json::to_value(task)?;
        self.enqueue(T::TYPE, payload, T::MAX_ATTEMPTS).await
    }

    /// Queue an already-serialized payload, e.g. straight from an HTTP body.
    pub async fn submit_raw(
        &self,
        task_type: &str,
        payload: serde_json::Value,
    ) -> Result<Submission, AppError> {
        let handler = self
            .registry
            .get(task_type)
            .ok_or_else(|| AppError::UnknownTaskType(task_type.to_string()))?;
        self.enqueue(task_type, payload, handler.max_attempts()).await
    }

    async fn enqueue(
        &self,
        task_type: &str,
        payload: serde_json::Value,
        max_attempts: u32,
    ) -> Result<Submission, AppError> {
        let envelope = TaskEnvelope::new(TaskType::new(task_type), payload);
        let task_id = self.context.broker.enqueue(envelope, max_attempts).await?;
        info!(task_id = %task_id, task_type, "task queued");
        Ok(Submission::queued(task_id))
    }

    /// `None` both while the task is unfinished and after its result expired;
    /// use `task_state` to tell those apart.
    pub async fn result(&self, task_id: TaskId) -> Result<Option<ResultView>, AppError> {
        Ok(self
            .context
            .results
            .get(task_id)
            .await?
            .map(ResultView::from))
    }

    pub async fn task_state(&self, task_id: TaskId) -> Result<Option<TaskState>, AppError> {
        Ok(self
            .context
            .broker
            .get(task_id)
            .await?
            .map(|record| record.state))
    }

    pub async fn task_status(&self, task_id: TaskId) -> Result<Option<TaskStatus>, AppError> {
        Ok(self
            .context
            .broker
            .get(task_id)
            .await?
            .as_ref()
            .map(TaskStatus::from))
    }

    pub async fn counts(&self) -> Result<QueueCounts, AppError> {
        Ok(self.context.broker.counts().await?)
    }

    /// Coordinator over `store`, caching with the configured default TTL.
    pub fn cache_aside<S: DurableStore>(&self, store: Arc<S>) -> CacheAsideCoordinator<S> {
        CacheAsideCoordinator::new(
            Arc::clone(&self.context.cache),
            store,
            self.settings.cache.default_ttl,
        )
    }

    pub fn worker(&self, id: usize) -> Worker {
        Worker::new(
            id,
            Arc::clone(&self.context.broker),
            Arc::clone(&self.context.results),
            Arc::clone(&self.registry),
            self.settings.retry.clone(),
            self.settings.results.ttl,
        )
        .with_transition_retry(
            self.settings.workers.transition_attempts,
            self.settings.workers.transition_backoff,
        )
    }

    /// Start `workers.count` workers.
    pub fn spawn_workers(&self) -> WorkerPool {
        self.spawn_worker_count(self.settings.workers.count)
    }

    pub fn spawn_worker_count(&self, count: usize) -> WorkerPool {
        let workers = (0..count).map(|id| self.worker(id)).collect();
        info!(workers = count, "worker pool starting");
        WorkerPool::spawn(workers, self.settings.workers.poll_interval)
    }

    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(
            Arc::clone(&self.context.cache),
            Arc::clone(&self.context.results),
            self.settings.sweeper.interval,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use crate::domain::ResultStatus;
    use crate::impls::{InMemoryRecordStore, InMemoryResultStore, InMemoryTaskBroker};
    use crate::ports::FixedClock;
    use crate::typed::fixtures::{Broken, BrokenHandler, Echo, EchoHandler, Flaky, FlakyHandler};

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.retry.base_delay = Duration::from_secs(1);
        settings
    }

    fn app_with_clock() -> (App, Arc<FixedClock>) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let app = App::builder()
            .settings(settings())
            .context(AppContext::in_memory(clock.clone()))
            .register::<Echo, _>(EchoHandler)
            .unwrap()
            .register::<Flaky, _>(FlakyHandler::new(2))
            .unwrap()
            .register::<Broken, _>(BrokenHandler::default())
            .unwrap()
            .build()
            .unwrap();
        (app, clock)
    }

    #[tokio::test]
    async fn submission_is_queued_and_result_not_yet_available() {
        let (app, _) = app_with_clock();
        let submission = app.submit(&Echo { message: "hi".into() }).await.unwrap();
        assert_eq!(submission.initial_status, "queued");

        assert_eq!(
            app.task_state(submission.task_id).await.unwrap(),
            Some(TaskState::Pending)
        );
        assert_eq!(app.result(submission.task_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn flaky_task_walks_the_documented_lifecycle() {
        let (app, clock) = app_with_clock();
        let worker = app.worker(0);
        let id = app.submit(&Flaky { label: "x".into() }).await.unwrap().task_id;

        worker.process_next().await.unwrap();
        clock.advance(Duration::from_secs(1));
        worker.process_next().await.unwrap();
        clock.advance(Duration::from_secs(2));
        worker.process_next().await.unwrap();

        let record = app.context().broker.get(id).await.unwrap().unwrap();
        let steps: Vec<(TaskState, Option<Duration>)> =
            record.history.iter().map(|t| (t.state, t.delay)).collect();
        assert_eq!(
            steps,
            vec![
                (TaskState::Pending, None),
                (TaskState::Running, None),
                (TaskState::RetryScheduled, Some(Duration::from_secs(1))),
                (TaskState::Running, None),
                (TaskState::RetryScheduled, Some(Duration::from_secs(2))),
                (TaskState::Running, None),
                (TaskState::Succeeded, None),
            ]
        );

        let view = app.result(id).await.unwrap().unwrap();
        assert_eq!(view.status, ResultStatus::Success);
        assert_eq!(view.error, None);
    }

    #[tokio::test]
    async fn failure_is_visible_only_through_retrieval() {
        let (app, _) = app_with_clock();
        let id = app
            .submit(&Broken { reason: "bad address".into() })
            .await
            .unwrap()
            .task_id;

        app.worker(0).process_next().await.unwrap();

        let view = app.result(id).await.unwrap().unwrap();
        assert_eq!(view.status, ResultStatus::Error);
        assert_eq!(view.error.as_deref(), Some("bad address"));
        let status = app.task_status(id).await.unwrap().unwrap();
        assert_eq!(status.state, TaskState::Failed);
        assert_eq!(status.attempt, 0);
    }

    #[tokio::test]
    async fn expired_result_is_not_found_but_state_remains() {
        let (app, clock) = app_with_clock();
        let id = app.submit(&Echo { message: "hi".into() }).await.unwrap().task_id;
        app.worker(0).process_next().await.unwrap();

        clock.advance(app.settings().results.ttl - Duration::from_secs(1));
        assert!(app.result(id).await.unwrap().is_some());

        clock.advance(Duration::from_secs(1));
        assert_eq!(app.result(id).await.unwrap(), None);
        assert_eq!(app.task_state(id).await.unwrap(), Some(TaskState::Succeeded));
    }

    #[tokio::test]
    async fn submit_raw_uses_the_registered_type() {
        let (app, _) = app_with_clock();
        let id = app
            .submit_raw(Echo::TYPE, json!({ "message": "raw" }))
            .await
            .unwrap()
            .task_id;
        app.worker(0).process_next().await.unwrap();

        let view = app.result(id).await.unwrap().unwrap();
        assert_eq!(view.result, Some(json!({ "echo": "raw" })));
    }

    #[tokio::test]
    async fn unknown_task_type_is_rejected() {
        let (app, _) = app_with_clock();
        let err = app.submit_raw("nope.v1", json!({})).await.unwrap_err();
        assert!(matches!(err, AppError::UnknownTaskType(t) if t == "nope.v1"));
        assert_eq!(app.counts().await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn broker_outage_fails_the_submission() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let broker = Arc::new(InMemoryTaskBroker::new(clock.clone()));
        let base = AppContext::in_memory(clock.clone());
        let context = AppContext::new(base.cache, broker.clone(), base.results, clock);
        let app = App::builder()
            .context(context)
            .register::<Echo, _>(EchoHandler)
            .unwrap()
            .build()
            .unwrap();

        broker.simulate_outage(true);
        let err = app.submit(&Echo { message: "hi".into() }).await.unwrap_err();
        assert!(matches!(err, AppError::Broker(BrokerError::Unavailable(_))));
    }

    #[tokio::test]
    async fn result_store_outage_fails_retrieval() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let results = Arc::new(InMemoryResultStore::new(clock.clone()));
        let base = AppContext::in_memory(clock.clone());
        let context = AppContext::new(base.cache, base.broker, results.clone(), clock);
        let app = App::builder().context(context).build().unwrap();

        results.simulate_outage(true);
        let id = TaskId::from_ulid(ulid::Ulid::new());
        assert!(matches!(app.result(id).await, Err(AppError::Results(_))));
    }

    #[tokio::test]
    async fn cache_aside_uses_configured_ttl() {
        let (app, _) = app_with_clock();
        let store = Arc::new(InMemoryRecordStore::<String>::new("example"));
        let coordinator = app.cache_aside(store);
        assert_eq!(coordinator.ttl(), Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn spawned_pool_drains_submissions() {
        let app = App::builder()
            .register::<Echo, _>(EchoHandler)
            .unwrap()
            .build()
            .unwrap();
        let mut ids = Vec::new();
        for i in 0..10 {
            ids.push(app.submit(&Echo { message: format!("m{i}") }).await.unwrap().task_id);
        }

        let pool = app.spawn_worker_count(3);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while app.counts().await.unwrap().succeeded < ids.len() {
            assert!(tokio::time::Instant::now() < deadline);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        pool.shutdown_and_join().await;

        for id in ids {
            assert!(app.result(id).await.unwrap().is_some());
        }
    }
}
