//! Job enqueue route.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/api/jobs` | Enqueue an assembly job (or reuse/reset an existing one) |

use axum::{extract::State, routing::post, Json, Router};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{EnqueueRequest, EnqueueResponse};
use crate::api::server::AppState;
use crate::database::models::{JobDbModel, JobStatus};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(enqueue))
}

/// Enqueue an assembly job.
///
/// Dedupe per target program `{program_type, world, lmid, lang}`:
/// - an existing PENDING job is reused as-is;
/// - an existing FAILED job is reset to PENDING with the fresh segment list
///   (inputs are immutable per recording set, so reprocessing is idempotent);
/// - otherwise a new PENDING row is inserted.
async fn enqueue(
    State(state): State<AppState>,
    Json(payload): Json<EnqueueRequest>,
) -> ApiResult<Json<EnqueueResponse>> {
    if payload.segments.is_empty() {
        return Err(ApiError::validation("segments must not be empty"));
    }

    let segments_json =
        serde_json::to_string(&payload.segments).map_err(crate::Error::from).map_err(ApiError::from)?;

    let existing = state
        .repository
        .find_by_target(
            payload.program_type.as_str(),
            &payload.world,
            &payload.lmid,
            &payload.lang,
        )
        .await
        .map_err(ApiError::from)?;

    if let Some(job) = existing {
        match job.parsed_status() {
            Some(JobStatus::Pending) => {
                return Ok(Json(EnqueueResponse {
                    job_id: job.id,
                    status: JobStatus::Pending.as_str().to_string(),
                    reused: true,
                }));
            }
            Some(JobStatus::Failed) => {
                if state
                    .repository
                    .reset_failed(&job.id, &segments_json)
                    .await
                    .map_err(ApiError::from)?
                {
                    info!(job_id = %job.id, "failed job reset to pending");
                    return Ok(Json(EnqueueResponse {
                        job_id: job.id,
                        status: JobStatus::Pending.as_str().to_string(),
                        reused: true,
                    }));
                }
                // Lost a race against another enqueue; fall through to insert.
            }
            _ => {}
        }
    }

    let job = JobDbModel::new(
        payload.program_type,
        payload.world,
        payload.lmid,
        payload.lang,
        segments_json,
    );
    state
        .repository
        .create_job(&job)
        .await
        .map_err(ApiError::from)?;
    info!(job_id = %job.id, "job enqueued");

    Ok(Json(EnqueueResponse {
        job_id: job.id,
        status: JobStatus::Pending.as_str().to_string(),
        reused: false,
    }))
}
