//! Handlers for the `/jobs` resource.
//!
//! Creation, listing, deletion, and feedback require authentication via
//! [`AuthUser`]. Reading a single job and its subscriptions only needs the
//! job id, so share links work without a session.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use layoutgen_core::error::CoreError;
use layoutgen_core::generation::{CreateJob, SubmitFeedback};
use layoutgen_core::status::JobStatus;
use layoutgen_core::types::JobId;
use layoutgen_db::models::job::{JobDetail, JobListQuery, NewJob};
use layoutgen_generation::{GenerationRequest, Routed};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::{reroute, DataResponse};
use crate::sse;
use crate::state::AppState;

/// A job as returned to clients, with its derived status.
#[derive(Debug, Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: JobDetail,
    pub status: JobStatus,
}

impl From<JobDetail> for JobView {
    fn from(job: JobDetail) -> Self {
        let status = job.status();
        Self { job, status }
    }
}

/// Body of a successful delete.
#[derive(Debug, Serialize)]
pub struct DeletedJob {
    pub id: JobId,
    /// Returned so the client can put it back into the prompt box.
    pub prompt: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch a live job by ID and verify the caller may modify it.
///
/// Returns `NotFound` for unknown or deleted jobs and `Forbidden` if another
/// user owns it. `action` is used in the error message.
async fn find_and_authorize(
    state: &AppState,
    job_id: JobId,
    auth: &AuthUser,
    action: &str,
) -> AppResult<JobDetail> {
    let job = state
        .jobs
        .find_job(job_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::job_not_found(job_id)))?;

    if !job.is_owned_by(&auth.user_id) {
        return Err(AppError::Core(CoreError::Forbidden(format!(
            "Cannot {action} another user's job"
        ))));
    }

    Ok(job)
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Persist a job owned by this replica and start generating. Returns 201
/// with the created job; output is read through the subscription endpoints.
pub async fn create_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateJob>,
) -> AppResult<impl IntoResponse> {
    let prompt = input.validated_prompt()?.to_string();
    state
        .quota
        .ensure_available(&auth.user_id, auth.is_anonymous)
        .await?;

    let job = state
        .jobs
        .create_job(NewJob {
            user_id: Some(auth.user_id.clone()),
            replica_id: state.runtime.replica_id().clone(),
            prompt: prompt.clone(),
            flags: input.flags.clone(),
        })
        .await?;

    state.runtime.start(
        job.id,
        GenerationRequest {
            prompt,
            flags: input.flags,
        },
    );

    tracing::info!(
        job_id = %job.id,
        user_id = %auth.user_id,
        replica_id = %job.replica_id,
        "Job created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: JobView::from(job) })))
}

// ---------------------------------------------------------------------------
// List / get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs?page=N
///
/// The caller's jobs, newest first, ten per page.
pub async fn list_jobs(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let page = state.jobs.list_jobs(&auth.user_id, &params).await?;
    Ok(Json(DataResponse { data: page }))
}

/// GET /api/v1/jobs/{id}
///
/// Reads persisted state only; a running job shows `running` on any replica.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .jobs
        .find_job(job_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::job_not_found(job_id)))?;
    Ok(Json(DataResponse { data: JobView::from(job) }))
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}/output
///
/// SSE stream of the job's output, replayed from the first chunk.
pub async fn subscribe_output(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<Response> {
    let token = state.runtime.subscriber_token();
    Ok(match state.runtime.output(job_id, token).await? {
        Routed::Local(output) => sse::output_events(output).into_response(),
        Routed::Reroute(replica) => reroute(&replica),
    })
}

/// GET /api/v1/jobs/{id}/status
///
/// SSE stream of status changes, ending after the terminal status.
pub async fn subscribe_status(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<Response> {
    let token = state.runtime.subscriber_token();
    Ok(match state.runtime.status(job_id, token).await? {
        Routed::Local(statuses) => sse::status_events(statuses).into_response(),
        Routed::Reroute(replica) => reroute(&replica),
    })
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// DELETE /api/v1/jobs/{id}
///
/// Cancel the generation if it is still running, then soft-delete the job.
/// A job still running on another replica is rerouted there, since only the
/// owning replica can stop its fetch.
pub async fn delete_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<Response> {
    let job = find_and_authorize(&state, job_id, &auth, "delete").await?;

    if let Routed::Reroute(replica) = state.runtime.cancel(job_id).await? {
        return Ok(reroute(&replica));
    }

    if !state.jobs.soft_delete_job(job_id).await? {
        return Err(AppError::Core(CoreError::job_not_found(job_id)));
    }

    tracing::info!(job_id = %job_id, user_id = %auth.user_id, "Job deleted");

    Ok(Json(DataResponse {
        data: DeletedJob {
            id: job.id,
            prompt: job.prompt,
        },
    })
    .into_response())
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

/// PUT /api/v1/jobs/{id}/feedback
pub async fn submit_feedback(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(input): Json<SubmitFeedback>,
) -> AppResult<impl IntoResponse> {
    input.check()?;
    find_and_authorize(&state, job_id, &auth, "rate").await?;

    let text = input.text.as_deref().map(str::trim).filter(|t| !t.is_empty());
    if !state.jobs.set_feedback(job_id, input.kind, text).await? {
        return Err(AppError::Core(CoreError::job_not_found(job_id)));
    }

    let job = state
        .jobs
        .find_job(job_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::job_not_found(job_id)))?;

    tracing::info!(job_id = %job_id, kind = input.kind.as_str(), "Feedback recorded");
    Ok(Json(DataResponse { data: JobView::from(job) }))
}
