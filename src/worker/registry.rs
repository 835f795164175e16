//! Handler registry: job-kind dispatch with lazy exactly-once startup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::error::{Error, HandlerError, ProtocolError};
use crate::job::{JobKind, JobPayload, RunMetadata};

/// A pluggable, domain-specific unit of work execution registered under one
/// job kind.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job kind this handler serves.
    fn kind(&self) -> JobKind;

    /// Build the handler's context (connections, prompts, lexicons). Called
    /// at most once per process per kind; the registry guards the race.
    async fn startup(&self) -> Result<(), HandlerError>;

    /// Process one job payload. `need_return` is true only for on-demand
    /// jobs; `Ok(None)` means nothing was extracted and is not an error.
    async fn process(
        &self,
        payload: JobPayload,
        run: &RunMetadata,
        need_return: bool,
    ) -> Result<Option<serde_json::Value>, HandlerError>;

    /// Release resources. Called at most once, only if `startup` ran.
    async fn shutdown(&self) -> Result<(), HandlerError>;
}

struct HandlerEntry {
    handler: Arc<dyn JobHandler>,
    started: OnceCell<()>,
}

/// Maps job kinds to handlers. Built once at process start; the only mutable
/// shared state is each entry's lazy-init cell.
pub struct HandlerRegistry {
    entries: HashMap<JobKind, HandlerEntry>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder {
            entries: HashMap::new(),
        }
    }

    /// Dispatch a job payload to its handler, lazily initializing the
    /// handler on first use. Exactly one `startup` runs even when multiple
    /// loops race on the same kind; losers wait for the winner.
    pub async fn dispatch(
        &self,
        kind: JobKind,
        payload: JobPayload,
        run: &RunMetadata,
        need_return: bool,
    ) -> Result<Option<serde_json::Value>, Error> {
        let entry = self
            .entries
            .get(&kind)
            .ok_or(ProtocolError::UnregisteredKind { kind })?;

        entry
            .started
            .get_or_try_init(|| async {
                tracing::info!(%kind, "Initializing handler");
                entry.handler.startup().await
            })
            .await
            .map_err(Error::Handler)?;

        entry
            .handler
            .process(payload, run, need_return)
            .await
            .map_err(Error::Handler)
    }

    /// Shut down every handler whose `startup` ran. Invoked once, either at
    /// graceful pool termination or after an unrecovered handler failure;
    /// shutdown errors are logged, not propagated.
    pub async fn shutdown_all(&self) {
        for (kind, entry) in &self.entries {
            if entry.started.initialized() {
                tracing::info!(%kind, "Shutting down handler");
                if let Err(e) = entry.handler.shutdown().await {
                    tracing::warn!(%kind, error = %e, "Handler shutdown failed");
                }
            }
        }
    }
}

pub struct HandlerRegistryBuilder {
    entries: HashMap<JobKind, HandlerEntry>,
}

impl HandlerRegistryBuilder {
    pub fn register(mut self, handler: Arc<dyn JobHandler>) -> Self {
        let kind = handler.kind();
        self.entries.insert(
            kind,
            HandlerEntry {
                handler,
                started: OnceCell::new(),
            },
        );
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            entries: self.entries,
        }
    }
}
