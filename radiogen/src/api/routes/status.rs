//! Status reporter routes: pull snapshot and SSE push stream.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/api/status/{id}` | One-shot JSON snapshot of a job |
//! | GET | `/api/status/{id}/stream` | SSE stream of status events |
//!
//! Both views are read-only over the job record; neither ever mutates state.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{StatusSnapshot, StreamEvent};
use crate::api::server::AppState;
use crate::database::models::JobStatus;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(get_status))
        .route("/{id}/stream", get(stream_status))
}

/// Pull view: a single snapshot of the job record.
///
/// Unknown ids are a 404 `JOB_NOT_FOUND`, never confused with a pending job.
async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusSnapshot>> {
    let job = state
        .repository
        .get_job(&id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::job_not_found(&id))?;

    Ok(Json(StatusSnapshot::from(job)))
}

/// Stream state machine: one `connected` event, then bounded polling.
enum Phase {
    Connect,
    Poll { checks: u32 },
    Done,
}

/// Push view: SSE events until the job terminates or the budget runs out.
///
/// Emits `connected` on open, `status` per poll, then closes after the first
/// terminal status; emits `timeout` and closes after `max_checks` polls if
/// the job never terminates; emits `error` and closes on unknown ids or
/// store failures. The budget here is independent of any job's own
/// processing timeout.
async fn stream_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let repository = state.repository.clone();
    let config = state.stream.clone();

    let events = stream::unfold(Phase::Connect, move |phase| {
        let repository = repository.clone();
        let config = config.clone();
        let job_id = id.clone();
        async move {
            match phase {
                Phase::Connect => {
                    let event = StreamEvent::Connected {
                        job_id: job_id.clone(),
                    };
                    Some((sse_event(&event), Phase::Poll { checks: 0 }))
                }
                Phase::Poll { checks } => {
                    if checks >= config.max_checks {
                        return Some((sse_event(&StreamEvent::Timeout { checks }), Phase::Done));
                    }
                    tokio::time::sleep(config.poll_interval).await;

                    match repository.get_job(&job_id).await {
                        Ok(Some(job)) => {
                            let status = job.parsed_status();
                            let terminal = status.is_some_and(|s| s.is_terminal());
                            let event = StreamEvent::Status {
                                job_id: job_id.clone(),
                                status: job.status.clone(),
                                program_url: (status == Some(JobStatus::Completed))
                                    .then_some(job.program_url)
                                    .flatten(),
                                error_message: (status == Some(JobStatus::Failed))
                                    .then_some(job.error_message)
                                    .flatten(),
                            };
                            let next = if terminal {
                                Phase::Done
                            } else {
                                Phase::Poll { checks: checks + 1 }
                            };
                            Some((sse_event(&event), next))
                        }
                        Ok(None) => Some((
                            sse_event(&StreamEvent::Error {
                                message: format!("Job {job_id} not found"),
                            }),
                            Phase::Done,
                        )),
                        Err(error) => Some((
                            sse_event(&StreamEvent::Error {
                                message: format!("status lookup failed: {error}"),
                            }),
                            Phase::Done,
                        )),
                    }
                }
                Phase::Done => None,
            }
        }
    })
    .map(Ok::<_, Infallible>);

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn sse_event(payload: &StreamEvent) -> Event {
    let event = Event::default().event(payload.name());
    match event.json_data(payload) {
        Ok(event) => event,
        Err(error) => {
            // Our own enum failing to serialize would be a bug; degrade to a
            // generic error event rather than dropping the connection.
            tracing::error!(%error, "failed to serialize stream event");
            Event::default()
                .event("error")
                .data(r#"{"type":"error","message":"event serialization failed"}"#)
        }
    }
}
