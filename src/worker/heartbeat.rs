//! Per-job heartbeat sentinel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::manager::ManagerApi;
use crate::worker::MAX_TRANSPORT_FAILURES;

/// Background task that reports liveness for one in-flight job until told to
/// stop.
///
/// The sentinel keeps its own consecutive-failure counter, independent of the
/// owning worker loop's: after [`MAX_TRANSPORT_FAILURES`] failed beats in a
/// row it silently abandons liveness reporting without disturbing the handler
/// or the loop.
pub struct HeartbeatSentinel {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl HeartbeatSentinel {
    /// Spawn a sentinel beating at `interval`. The first beat fires
    /// immediately.
    pub fn start(manager: Arc<dyn ManagerApi>, job_id: u64, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut failures: u32 = 0;

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        match manager.report_heartbeat(job_id).await {
                            Ok(()) => failures = 0,
                            Err(e) => {
                                failures += 1;
                                tracing::warn!(
                                    job_id,
                                    attempt = failures,
                                    max = MAX_TRANSPORT_FAILURES,
                                    error = %e,
                                    "Heartbeat failed"
                                );
                                if failures >= MAX_TRANSPORT_FAILURES {
                                    tracing::warn!(
                                        job_id,
                                        "Abandoning heartbeat after repeated failures"
                                    );
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        });

        Self { stop_tx, handle }
    }

    /// Signal the sentinel to stop and wait for it to exit. Completing this
    /// call guarantees no heartbeat is sent after it returns, so the owning
    /// loop must `stop().await` before reporting the job done.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.handle.await;
    }
}
