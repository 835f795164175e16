//! Worker pool: N concurrent loops over one registry and one client.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::config::WorkerConfig;
use crate::error::Error;
use crate::manager::ManagerApi;
use crate::worker::registry::HandlerRegistry;
use crate::worker::worker::WorkerLoop;

/// Spawns `pool_count` worker loops and waits for all of them to terminate.
///
/// Failure policy is fail-fast for handler bugs: any non-transport error from
/// a loop aborts the siblings and shuts down every initialized handler —
/// handler state is untrustworthy after an unexpected failure. Transport-fatal
/// loop initialization failures let the siblings run on and only surface in
/// the pool's return value.
pub struct WorkerPool {
    manager: Arc<dyn ManagerApi>,
    registry: Arc<HandlerRegistry>,
    pool_count: usize,
    retry_after: Duration,
}

impl WorkerPool {
    pub fn new(
        manager: Arc<dyn ManagerApi>,
        registry: Arc<HandlerRegistry>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            manager,
            registry,
            pool_count: config.pool_count,
            retry_after: config.retry_after,
        }
    }

    pub async fn run(self) -> Result<(), Error> {
        tracing::info!(pool_count = self.pool_count, "Starting worker pool");

        let mut loops = JoinSet::new();
        for slot in 0..self.pool_count {
            let worker = WorkerLoop::new(
                slot,
                self.manager.clone(),
                self.registry.clone(),
                self.retry_after,
            );
            loops.spawn(worker.run());
        }

        let mut fatal: Option<Error> = None;
        let mut init_failure: Option<Error> = None;
        while let Some(joined) = loops.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => match e {
                    Error::Transport(_) => {
                        tracing::error!(error = %e, "Worker loop failed to initialize");
                        init_failure.get_or_insert(e);
                    }
                    other => {
                        if fatal.is_none() {
                            tracing::error!(error = %other, "Shutting down pool after error");
                            fatal = Some(other);
                            loops.abort_all();
                        }
                    }
                },
                Err(join_err) if join_err.is_cancelled() => {}
                Err(join_err) => {
                    if fatal.is_none() {
                        tracing::error!(error = %join_err, "Worker loop panicked, shutting down pool");
                        fatal = Some(Error::Handler(crate::error::HandlerError::Panicked(
                            join_err.to_string(),
                        )));
                        loops.abort_all();
                    }
                }
            }
        }

        self.registry.shutdown_all().await;

        match fatal.or(init_failure) {
            Some(e) => Err(e),
            None => {
                tracing::info!("Worker pool done");
                Ok(())
            }
        }
    }
}
