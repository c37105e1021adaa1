//! Background expiry sweep
//!
//! One tokio task per cache, ticking on an interval until its
//! `CancellationToken` fires.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::store::CacheStore;

/// Owner of a running sweeper task; dropping it cancels the task
#[derive(Debug)]
pub struct SweeperHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Cancel the sweep and wait for the task to exit
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

pub(crate) fn spawn<V>(cache: Arc<CacheStore<V>>, interval: Duration) -> SweeperHandle
where
    V: Send + Sync + 'static,
{
    let token = CancellationToken::new();
    let cancelled = token.clone();
    let period = interval.max(Duration::from_millis(1));

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        info!(interval_ms = period.as_millis() as u64, "cache sweeper started");
        loop {
            tokio::select! {
                _ = cancelled.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = cache.cleanup();
                    if removed > 0 {
                        debug!(removed, "cache sweep removed expired entries");
                    }
                }
            }
        }
        info!("cache sweeper stopped");
    });

    SweeperHandle {
        token,
        task: Some(task),
    }
}
