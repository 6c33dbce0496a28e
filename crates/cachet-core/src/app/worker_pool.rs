//! WorkerPool - 固定数の worker を tokio task として回す
//!
//! - `shutdown_and_join()` は新しい取り出しを止めるだけで、実行中の
//!   handler は完了まで待つ（Running のタスクはキャンセルしない）
//! - idle の worker は `TaskBroker::wait_for_work` で最大 `poll_interval` 待つ
//! - broker エラーの後は `wait_for_work` を使わず、`poll_interval` から倍々で
//!   （最大 `poll_interval * 2^MAX_BACKOFF_SHIFT`）待つ。成功すれば元に戻る
//!
//! 配送は at-least-once。登録する Handler は冪等であること
//! （`Handler` の doc を参照）。pool 側では検査しない。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::worker_loop::Worker;

const MAX_BACKOFF_SHIFT: u32 = 5;

pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn one tokio task per worker.
    pub fn spawn(workers: Vec<Worker>, poll_interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let joins = workers
            .into_iter()
            .map(|worker| {
                let rx = shutdown_rx.clone();
                tokio::spawn(run(worker, poll_interval, rx))
            })
            .collect();

        Self { shutdown_tx, joins }
    }

    pub fn size(&self) -> usize {
        self.joins.len()
    }

    /// Stop taking new tasks. In-flight handlers keep running.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for every worker to finish its current task.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                warn!(error = %e, "worker task ended abnormally");
            }
        }
    }
}

async fn run(worker: Worker, poll_interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    debug!(worker_id = worker.id(), "worker started");
    let mut errors: u32 = 0;
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match worker.process_next().await {
            Ok(Some(_)) => {
                errors = 0;
                continue;
            }
            Ok(None) => errors = 0,
            Err(e) => {
                errors = errors.saturating_add(1);
                warn!(
                    worker_id = worker.id(),
                    error = %e,
                    consecutive_errors = errors,
                    "broker call failed"
                );
            }
        }

        let backoff = error_backoff(poll_interval, errors);
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = worker.broker().wait_for_work(poll_interval), if errors == 0 => {}
            _ = tokio::time::sleep(backoff), if errors > 0 => {}
        }
    }
    debug!(worker_id = worker.id(), "worker stopped");
}

/// Wait after `errors` consecutive broker failures.
fn error_backoff(poll_interval: Duration, errors: u32) -> Duration {
    let shift = errors.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
    poll_interval.saturating_mul(1u32 << shift)
}
