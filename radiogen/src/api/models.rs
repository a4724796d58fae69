//! API request/response models.

use serde::{Deserialize, Serialize};

use mixdown::SegmentDescriptor;

use crate::database::models::{JobDbModel, JobStatus, ProgramType};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Request body for enqueueing a job.
#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub program_type: ProgramType,
    pub world: String,
    pub lmid: String,
    pub lang: String,
    /// Segment descriptors in playback order.
    pub segments: Vec<SegmentDescriptor>,
}

/// Response for an enqueued job.
#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: String,
    pub status: String,
    /// Whether an existing pending/failed job was reused instead of creating
    /// a new row.
    pub reused: bool,
}

/// Response for a processor invocation.
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

/// Pull view over a job record.
///
/// Result fields appear only alongside their status: `program_url` with
/// completed, `error_message` with failed, never both.
#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub id: String,
    pub status: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<JobDbModel> for StatusSnapshot {
    fn from(job: JobDbModel) -> Self {
        let status = job.parsed_status();
        let completed = status == Some(JobStatus::Completed);
        let failed = status == Some(JobStatus::Failed);
        Self {
            id: job.id,
            status: job.status,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            program_url: completed.then_some(job.program_url).flatten(),
            file_count: completed.then_some(job.file_count).flatten(),
            processing_duration_ms: job.processing_duration_ms,
            error_message: failed.then_some(job.error_message).flatten(),
        }
    }
}

/// One event on the status push stream.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Emitted once when the stream opens.
    Connected { job_id: String },
    /// Emitted on every poll of the store.
    Status {
        job_id: String,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        program_url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
    /// The store lookup failed or the job does not exist.
    Error { message: String },
    /// The wall-clock budget was exhausted before the job terminated.
    Timeout { checks: u32 },
}

impl StreamEvent {
    /// SSE event name, matching the JSON discriminator.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Status { .. } => "status",
            Self::Error { .. } => "error",
            Self::Timeout { .. } => "timeout",
        }
    }
}
