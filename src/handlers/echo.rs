//! Diagnostic handler: logs its batch and echoes it back on demand.
//!
//! Registered under `test_data` so a deployment can be smoke-tested end to
//! end without an inference backend.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::HandlerError;
use crate::job::{JobKind, JobPayload, RunMetadata};
use crate::worker::JobHandler;

#[derive(Default)]
pub struct EchoHandler;

#[async_trait]
impl JobHandler for EchoHandler {
    fn kind(&self) -> JobKind {
        JobKind::Echo
    }

    async fn startup(&self) -> Result<(), HandlerError> {
        tracing::info!("Ready to accept test jobs");
        Ok(())
    }

    async fn process(
        &self,
        payload: JobPayload,
        run: &RunMetadata,
        need_return: bool,
    ) -> Result<Option<Value>, HandlerError> {
        let JobPayload::Echo(items) = payload else {
            return Err(HandlerError::UnexpectedPayload { kind: self.kind() });
        };
        tracing::info!(run_id = %run.run_id, batch = items.len(), "Echo batch");

        if need_return {
            Ok(Some(json!({ "echo": items })))
        } else {
            Ok(None)
        }
    }

    async fn shutdown(&self) -> Result<(), HandlerError> {
        Ok(())
    }
}
