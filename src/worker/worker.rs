//! Per-slot worker loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, TransportError};
use crate::job::{JobPayload, RunMetadata};
use crate::manager::{ManagerApi, RequestJobError};
use crate::worker::MAX_TRANSPORT_FAILURES;
use crate::worker::heartbeat::HeartbeatSentinel;
use crate::worker::registry::HandlerRegistry;

/// One polling loop: fetches run metadata once, then requests jobs until its
/// transport-failure budget is exhausted or a fatal error escapes a handler.
///
/// Loops are independent — a loop that terminates on exhausted retries does
/// not disturb its siblings in the pool.
pub struct WorkerLoop {
    slot: usize,
    manager: Arc<dyn ManagerApi>,
    registry: Arc<HandlerRegistry>,
    retry_after: Duration,
}

impl WorkerLoop {
    pub fn new(
        slot: usize,
        manager: Arc<dyn ManagerApi>,
        registry: Arc<HandlerRegistry>,
        retry_after: Duration,
    ) -> Self {
        Self {
            slot,
            manager,
            registry,
            retry_after,
        }
    }

    /// Run until terminated. `Ok(())` is the loop-local exit (exhausted poll
    /// retries); `Err` is either a fatal metadata-fetch failure or an error
    /// that escaped a handler and must take the pool down.
    pub async fn run(self) -> Result<(), Error> {
        let run = self.fetch_metadata().await?;
        tracing::info!(slot = self.slot, run_id = %run.run_id, "Worker loop started");

        let mut failures: u32 = 0;
        loop {
            let job = match self.manager.request_job().await {
                Ok(job) => {
                    failures = 0;
                    job
                }
                Err(RequestJobError::Transport(e)) => {
                    failures += 1;
                    tracing::error!(
                        slot = self.slot,
                        attempt = failures,
                        max = MAX_TRANSPORT_FAILURES,
                        error = %e,
                        "Job request failed, retrying in {}s",
                        self.retry_after.as_secs()
                    );
                    if failures >= MAX_TRANSPORT_FAILURES {
                        tracing::info!(slot = self.slot, "Worker loop done");
                        return Ok(());
                    }
                    tokio::time::sleep(self.retry_after).await;
                    continue;
                }
                Err(RequestJobError::Protocol(e)) => return Err(e.into()),
            };

            let Some(kind) = job.payload.kind() else {
                // `wait`: no work available, back off and poll again.
                tokio::time::sleep(self.retry_after).await;
                continue;
            };

            let started = Instant::now();
            tracing::info!(slot = self.slot, job_id = job.id, %kind, "Starting job");

            let sentinel =
                HeartbeatSentinel::start(self.manager.clone(), job.id, run.heartbeat_interval());
            let outcome = self
                .registry
                .dispatch(kind, job.payload, &run, job.on_demand)
                .await;
            // Stop-and-join before reporting: no heartbeat may fire after the
            // completion report.
            sentinel.stop().await;

            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(slot = self.slot, job_id = job.id, error = %e, "Job failed");
                    return Err(e);
                }
            };

            let report = if job.on_demand { result } else { None };
            if let Err(e) = self.manager.report_job_done(job.id, report).await {
                // Not retried: the manager will re-issue the job once the
                // heartbeat goes stale.
                tracing::error!(slot = self.slot, job_id = job.id, error = %e, "Finish message failed");
                continue;
            }

            tracing::info!(
                slot = self.slot,
                job_id = job.id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Finished job"
            );
        }
    }

    /// Fetch run metadata with bounded fixed-delay retry. Exhaustion is fatal
    /// for this loop.
    async fn fetch_metadata(&self) -> Result<RunMetadata, Error> {
        for attempt in 1..=MAX_TRANSPORT_FAILURES {
            match self.manager.fetch_run_metadata().await {
                Ok(run) => return Ok(run),
                Err(e) => {
                    tracing::error!(
                        slot = self.slot,
                        attempt,
                        max = MAX_TRANSPORT_FAILURES,
                        error = %e,
                        "Metadata fetch failed"
                    );
                    if attempt < MAX_TRANSPORT_FAILURES {
                        tokio::time::sleep(self.retry_after).await;
                    }
                }
            }
        }
        Err(TransportError::RetriesExhausted {
            endpoint: "run_metadata",
            attempts: MAX_TRANSPORT_FAILURES,
        }
        .into())
    }
}
