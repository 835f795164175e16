//! Control-plane client for the job manager.
//!
//! Thin wrapper over four HTTP operations. Retry policy lives with the
//! callers (the worker loop and the heartbeat sentinel), not here — each
//! call is a single attempt with its own failure handling.

use async_trait::async_trait;
use serde_json::json;

use crate::error::{ProtocolError, TransportError};
use crate::job::{JobDescriptor, RunMetadata};

/// Control-plane surface as seen by the worker runtime.
///
/// Behind a trait so tests can drive the runtime with a scripted in-process
/// manager instead of a live HTTP endpoint.
#[async_trait]
pub trait ManagerApi: Send + Sync {
    /// Fetch per-run metadata. Called once per worker loop before polling.
    async fn fetch_run_metadata(&self) -> Result<RunMetadata, TransportError>;

    /// Request the next job. The manager decides assignment; a `wait`
    /// descriptor means no work is available.
    async fn request_job(&self) -> Result<JobDescriptor, RequestJobError>;

    /// Fire-and-forget liveness signal for an in-flight job.
    async fn report_heartbeat(&self, job_id: u64) -> Result<(), TransportError>;

    /// Mark a job complete. `result` is attached only for on-demand jobs.
    async fn report_job_done(
        &self,
        job_id: u64,
        result: Option<serde_json::Value>,
    ) -> Result<(), TransportError>;
}

/// `RequestJob` failures split by retryability: transport failures count
/// against the loop's bounded retry budget, protocol violations are fatal.
#[derive(Debug, thiserror::Error)]
pub enum RequestJobError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// HTTP implementation of [`ManagerApi`].
pub struct ManagerClient {
    base_url: String,
    http: reqwest::Client,
}

impl ManagerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    async fn post(
        &self,
        endpoint: &'static str,
        body: Option<serde_json::Value>,
    ) -> Result<String, TransportError> {
        let mut request = self.http.post(format!("{}/{endpoint}", self.base_url));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| TransportError::Manager {
                endpoint,
                reason: e.to_string(),
            })?;
        response.text().await.map_err(|e| TransportError::Manager {
            endpoint,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ManagerApi for ManagerClient {
    async fn fetch_run_metadata(&self) -> Result<RunMetadata, TransportError> {
        let body = self.post("run_metadata", None).await?;
        serde_json::from_str(&body).map_err(|e| TransportError::Manager {
            endpoint: "run_metadata",
            reason: format!("undecodable metadata: {e}"),
        })
    }

    async fn request_job(&self) -> Result<JobDescriptor, RequestJobError> {
        let body = self.post("request_job", None).await?;
        // A response that arrived but does not decode is a worker/manager
        // version mismatch, not a transient condition.
        let job = serde_json::from_str(&body)
            .map_err(|e| ProtocolError::MalformedJob(e.to_string()))?;
        Ok(job)
    }

    async fn report_heartbeat(&self, job_id: u64) -> Result<(), TransportError> {
        self.post("health_check", Some(json!({ "ID": job_id })))
            .await?;
        Ok(())
    }

    async fn report_job_done(
        &self,
        job_id: u64,
        result: Option<serde_json::Value>,
    ) -> Result<(), TransportError> {
        let body = match result {
            Some(result) => json!({ "ID": job_id, "Result": result }),
            None => json!({ "ID": job_id }),
        };
        self.post("finish_job", Some(body)).await?;
        Ok(())
    }
}
