//! In-memory task broker.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};

use crate::domain::{QueueCounts, TaskEnvelope, TaskId, TaskRecord, TaskState};
use crate::ports::{BrokerError, Clock, IdGenerator, TaskBroker, UlidGenerator};

/// Retry schedule entry.
///
/// Ordering is reversed so that `BinaryHeap` pops the earliest entry first.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledTask {
    eligible_at: DateTime<Utc>,
    task_id: TaskId,
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .eligible_at
            .cmp(&self.eligible_at)
            .then_with(|| other.task_id.cmp(&self.task_id))
    }
}

struct BrokerState {
    /// All task records (single source of truth).
    records: HashMap<TaskId, TaskRecord>,

    /// Eligible task ids, FIFO.
    ready: VecDeque<TaskId>,

    /// RetryScheduled task ids waiting for their lower bound.
    scheduled: BinaryHeap<ScheduledTask>,
}

impl BrokerState {
    fn new() -> Self {
        Self {
            records: HashMap::new(),
            ready: VecDeque::new(),
            scheduled: BinaryHeap::new(),
        }
    }

    /// Move retries whose lower bound has passed onto the ready queue.
    fn promote_due(&mut self, now: DateTime<Utc>) {
        while let Some(entry) = self.scheduled.peek() {
            if entry.eligible_at > now {
                break;
            }
            let Some(entry) = self.scheduled.pop() else {
                break;
            };
            if let Some(record) = self.records.get(&entry.task_id)
                && record.state == TaskState::RetryScheduled
            {
                self.ready.push_back(entry.task_id);
            }
        }
    }

    /// Look up a task that must currently be Running.
    fn running_mut(
        &mut self,
        task_id: TaskId,
        to: TaskState,
    ) -> Result<&mut TaskRecord, BrokerError> {
        let record = self
            .records
            .get_mut(&task_id)
            .ok_or(BrokerError::NotFound(task_id))?;
        if record.state != TaskState::Running {
            return Err(BrokerError::InvalidTransition {
                task_id,
                from: record.state,
                to,
            });
        }
        Ok(record)
    }

    fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for record in self.records.values() {
            match record.state {
                TaskState::Pending => counts.pending += 1,
                TaskState::Running => counts.running += 1,
                TaskState::RetryScheduled => counts.retry_scheduled += 1,
                TaskState::Succeeded => counts.succeeded += 1,
                TaskState::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

/// In-memory `TaskBroker`.
///
/// Every operation runs under one lock, so `dequeue` hands a task id to at
/// most one caller until that caller moves it out of Running. Nothing is
/// persisted; a process restart loses all tasks.
pub struct InMemoryTaskBroker {
    state: Mutex<BrokerState>,
    notify: Notify,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    available: AtomicBool,
}

impl InMemoryTaskBroker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        Self::with_id_generator(clock, ids)
    }

    pub fn with_id_generator(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: Mutex::new(BrokerState::new()),
            notify: Notify::new(),
            clock,
            ids,
            available: AtomicBool::new(true),
        }
    }

    /// Make every operation fail with `BrokerError::Unavailable` (or succeed again).
    pub fn simulate_outage(&self, down: bool) {
        self.available.store(!down, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), BrokerError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrokerError::Unavailable("in-memory broker marked down".into()))
        }
    }
}

#[async_trait]
impl TaskBroker for InMemoryTaskBroker {
    async fn enqueue(
        &self,
        envelope: TaskEnvelope,
        max_attempts: u32,
    ) -> Result<TaskId, BrokerError> {
        self.check_available()?;
        let task_id = self.ids.generate_task_id();
        {
            let mut state = self.state.lock().await;
            let record = TaskRecord::new(task_id, envelope, max_attempts, self.clock.now());
            state.records.insert(task_id, record);
            state.ready.push_back(task_id);
        }
        self.notify.notify_one();
        Ok(task_id)
    }

    async fn schedule_retry(
        &self,
        task_id: TaskId,
        delay: Duration,
        error: String,
    ) -> Result<(), BrokerError> {
        self.check_available()?;
        {
            let mut state = self.state.lock().await;
            let now = self.clock.now();
            let record = state.running_mut(task_id, TaskState::RetryScheduled)?;
            record.schedule_retry(delay, error, now);
            let eligible_at = record.next_eligible_at.unwrap_or(now);
            state.scheduled.push(ScheduledTask {
                eligible_at,
                task_id,
            });
        }
        // A parked worker recomputes its wake-up time from the new heap head.
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<TaskRecord>, BrokerError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        state.promote_due(now);

        while let Some(task_id) = state.ready.pop_front() {
            if let Some(record) = state.records.get_mut(&task_id)
                && record.is_eligible(now)
            {
                record.start_running(now);
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    async fn complete(&self, task_id: TaskId) -> Result<(), BrokerError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        state
            .running_mut(task_id, TaskState::Succeeded)?
            .mark_succeeded(now);
        Ok(())
    }

    async fn fail(&self, task_id: TaskId, error: String) -> Result<(), BrokerError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        state
            .running_mut(task_id, TaskState::Failed)?
            .mark_failed(error, now);
        Ok(())
    }

    async fn get(&self, task_id: TaskId) -> Result<Option<TaskRecord>, BrokerError> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state.records.get(&task_id).cloned())
    }

    async fn counts(&self) -> Result<QueueCounts, BrokerError> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state.counts())
    }

    async fn wait_for_work(&self, timeout: Duration) {
        let wait = {
            let state = self.state.lock().await;
            if !state.ready.is_empty() {
                return;
            }
            state
                .scheduled
                .peek()
                .map(|entry| {
                    (entry.eligible_at - self.clock.now())
                        .to_std()
                        .unwrap_or(Duration::ZERO)
                })
                .map_or(timeout, |until_due| until_due.min(timeout))
        };

        tokio::select! {
            _ = self.notify.notified() => {},
            _ = tokio::time::sleep(wait) => {},
        }
    }
}
