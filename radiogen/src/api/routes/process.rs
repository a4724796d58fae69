//! Processor trigger route.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/api/process` | Claim and process the oldest pending job, or a specific one |
//!
//! Untargeted invocations drain the queue FIFO; targeted ones
//! (`?job_id=` or a JSON body) give low-latency processing right after an
//! enqueue.

use axum::{
    body::Bytes,
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::ProcessResponse;
use crate::api::server::AppState;
use crate::services::{JobSelector, ProcessOutcome};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(process))
}

#[derive(Debug, Default, Deserialize)]
struct ProcessParams {
    job_id: Option<String>,
}

/// Claim and process one job.
///
/// # Response classes
///
/// - 200: job completed, or nothing to do
/// - 404: targeted job missing or already taken
/// - 429: another pipeline is running in this worker instance
/// - 500: pipeline or upload failure (the job record carries the error)
async fn process(
    State(state): State<AppState>,
    Query(params): Query<ProcessParams>,
    body: Bytes,
) -> ApiResult<Json<ProcessResponse>> {
    // The body is optional; when present it must be valid JSON.
    let body_params: Option<ProcessParams> = if body.is_empty() {
        None
    } else {
        Some(
            serde_json::from_slice(&body)
                .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))?,
        )
    };

    let job_id = body_params
        .and_then(|b| b.job_id)
        .or(params.job_id)
        .filter(|id| !id.trim().is_empty());

    let selector = match job_id {
        Some(id) => JobSelector::ById(id),
        None => JobSelector::OldestPending,
    };

    let outcome = state
        .processor
        .process(selector)
        .await
        .map_err(ApiError::from)?;

    match outcome {
        ProcessOutcome::Completed {
            job_id,
            program_url,
            file_count,
            duration_ms,
        } => Ok(Json(ProcessResponse {
            message: "job completed".to_string(),
            job_id: Some(job_id),
            program_url: Some(program_url),
            file_count: Some(file_count),
            duration_ms: Some(duration_ms),
        })),
        ProcessOutcome::NothingToDo => Ok(Json(ProcessResponse {
            message: "no pending jobs".to_string(),
            job_id: None,
            program_url: None,
            file_count: None,
            duration_ms: None,
        })),
        ProcessOutcome::NotFound { job_id } => Err(ApiError::not_found(format!(
            "Job {job_id} not found or already processed"
        ))),
        ProcessOutcome::Busy { retry_after_secs } => Err(ApiError::too_many_requests(
            "another assembly is already running",
        )
        .with_details(serde_json::json!({ "retry_after_secs": retry_after_secs }))),
        ProcessOutcome::Failed { job_id, error } => Err(ApiError::internal(format!(
            "Job {job_id} failed: {error}"
        ))),
    }
}
