//! Job database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One request to assemble a radio program from recordings.
///
/// Rows are append-only and status only moves forward:
/// `PENDING -> PROCESSING -> {COMPLETED | FAILED}`. The queue processor is the
/// only writer after creation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct JobDbModel {
    pub id: String,
    /// Status: PENDING, PROCESSING, COMPLETED, FAILED.
    pub status: String,
    /// ISO 8601 timestamp when the job was created.
    pub created_at: String,
    /// ISO 8601 timestamp when the job was claimed.
    pub started_at: Option<String>,
    /// ISO 8601 timestamp when the job reached a terminal status.
    pub completed_at: Option<String>,
    /// Program type: kids or parent.
    pub program_type: String,
    /// World the program belongs to.
    pub world: String,
    /// Little Microphones ID the program belongs to.
    pub lmid: String,
    /// Program language code.
    pub lang: String,
    /// JSON array of segment descriptors, in playback order.
    pub segments: String,
    /// Public URL of the rendered program; set only alongside COMPLETED.
    pub program_url: Option<String>,
    /// Number of source clips that went into the program.
    pub file_count: Option<i64>,
    /// Failure reason; set only alongside FAILED.
    pub error_message: Option<String>,
    /// Wall-clock pipeline duration in milliseconds.
    pub processing_duration_ms: Option<i64>,
}

impl JobDbModel {
    pub fn new(
        program_type: ProgramType,
        world: impl Into<String>,
        lmid: impl Into<String>,
        lang: impl Into<String>,
        segments_json: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Pending.as_str().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            started_at: None,
            completed_at: None,
            program_type: program_type.as_str().to_string(),
            world: world.into(),
            lmid: lmid.into(),
            lang: lang.into(),
            segments: segments_json.into(),
            program_url: None,
            file_count: None,
            error_message: None,
            processing_duration_ms: None,
        }
    }

    /// Parsed status; malformed rows surface as `None`.
    pub fn parsed_status(&self) -> Option<JobStatus> {
        JobStatus::parse(&self.status)
    }
}

/// Job status values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Queued and waiting to be claimed.
    Pending,
    /// Claimed by a worker; the assembly pipeline is running.
    Processing,
    /// Finished; `program_url` is populated.
    Completed,
    /// Failed; `error_message` is populated, never a partial URL.
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "PROCESSING" => Some(Self::Processing),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal statuses are final for every observer.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Program types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProgramType {
    Kids,
    Parent,
}

impl ProgramType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kids => "kids",
            Self::Parent => "parent",
        }
    }
}
