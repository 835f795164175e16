//! Job descriptors and run metadata as served by the manager.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

/// Per-run metadata, fetched once per worker loop before polling starts and
/// immutable for the loop's lifetime.
#[derive(Debug, Clone, Deserialize)]
pub struct RunMetadata {
    #[serde(rename = "RunID")]
    pub run_id: String,
    #[serde(rename = "PipelineId")]
    pub pipeline_id: String,
    /// Manager-side staleness window in seconds. Jobs with no heartbeat for
    /// this long are declared abandoned.
    #[serde(rename = "HealthTimeout")]
    pub heartbeat_interval_secs: u64,
}

impl RunMetadata {
    /// Cadence for the heartbeat sentinel: four beats per manager timeout
    /// window, leaving margin for missed beats.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs_f64(self.heartbeat_interval_secs as f64 / 4.0)
    }
}

/// A unit of work assigned by the manager.
#[derive(Debug, Clone, Deserialize)]
pub struct JobDescriptor {
    #[serde(rename = "ID")]
    pub id: u64,
    /// On-demand jobs return their result through the completion report
    /// instead of posting it to the results endpoint.
    #[serde(rename = "OnDemand", default)]
    pub on_demand: bool,
    #[serde(flatten)]
    pub payload: JobPayload,
}

/// Closed set of job payloads. `Wait` carries no data and signals that the
/// manager has no work to hand out.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "JobType", content = "JobData")]
pub enum JobPayload {
    #[serde(rename = "wait")]
    Wait,
    /// Batch of paragraph ids to pull from the vector store.
    #[serde(rename = "weaviate_data")]
    Paragraphs(Vec<Uuid>),
    /// Batch of geologic map unit descriptions.
    #[serde(rename = "map_description_data")]
    MapDescriptions(Vec<String>),
    /// Diagnostic batch, echoed back.
    #[serde(rename = "test_data")]
    Echo(Vec<String>),
}

impl JobPayload {
    /// Dispatch discriminant; `None` for the `Wait` sentinel.
    pub fn kind(&self) -> Option<JobKind> {
        match self {
            Self::Wait => None,
            Self::Paragraphs(_) => Some(JobKind::Paragraphs),
            Self::MapDescriptions(_) => Some(JobKind::MapDescriptions),
            Self::Echo(_) => Some(JobKind::Echo),
        }
    }
}

/// Handler dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Paragraphs,
    MapDescriptions,
    Echo,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Paragraphs => "weaviate_data",
            Self::MapDescriptions => "map_description_data",
            Self::Echo => "test_data",
        };
        write!(f, "{s}")
    }
}
