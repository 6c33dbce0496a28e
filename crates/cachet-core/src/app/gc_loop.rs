//! Sweeper - 期限切れのキャッシュエントリと結果を定期的に掃除する
//!
//! 読み出し側は lazy expiry で期限切れを返さないので、これは
//! メモリを返すためだけのもの。止まっていても正しさには影響しない。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::ports::{CacheStore, ResultStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub cache_entries: usize,
    pub results: usize,
}

pub struct Sweeper {
    cache: Arc<dyn CacheStore>,
    results: Arc<dyn ResultStore>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(cache: Arc<dyn CacheStore>, results: Arc<dyn ResultStore>, interval: Duration) -> Self {
        Self {
            cache,
            results,
            interval,
        }
    }

    /// One pass over both stores. A failing store is logged and skipped.
    pub async fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();
        match self.cache.purge_expired().await {
            Ok(n) => report.cache_entries = n,
            Err(e) => warn!(error = %e, "cache sweep failed"),
        }
        match self.results.purge_expired().await {
            Ok(n) => report.results = n,
            Err(e) => warn!(error = %e, "result sweep failed"),
        }
        debug!(
            cache_entries = report.cache_entries,
            results = report.results,
            "sweep finished"
        );
        report
    }

    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(self.interval) => {
                        self.sweep_once().await;
                    }
                }
            }
        });
        SweeperHandle { shutdown_tx, join }
    }
}

pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn shutdown_and_join(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            warn!(error = %e, "sweeper task ended abnormally");
        }
    }
}
