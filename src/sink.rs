//! Results sink: posts extraction batches to the collection endpoint.

use serde_json::{Value, json};

use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::job::RunMetadata;

/// Build the run-results payload shared by the sink and the on-demand return
/// path.
pub fn run_payload(
    run: &RunMetadata,
    model_name: &str,
    model_version: u32,
    results: Vec<Value>,
) -> Value {
    json!({
        "run_id": run.run_id,
        "extraction_pipeline_id": run.pipeline_id,
        "model_name": model_name,
        "model_version": model_version,
        "results": results,
    })
}

/// HTTP client for the results-collection endpoint.
pub struct ResultSink {
    http: reqwest::Client,
    endpoint: String,
}

impl ResultSink {
    pub fn new(config: &SinkConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
        }
    }

    /// Post a run payload. The endpoint rejects non-ASCII, so the serialized
    /// body is stripped before sending.
    pub async fn post(&self, payload: &Value) -> Result<(), SinkError> {
        let mut body = serde_json::to_string(payload)?;
        body.retain(|c| c.is_ascii());

        self.http
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SinkError::PostFailed(e.to_string()))?;
        Ok(())
    }
}
