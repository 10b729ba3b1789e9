//! Route definitions for the `/jobs` resource.

use axum::routing::{get, put};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                -> list_jobs
/// POST   /                -> create_job
/// GET    /{id}            -> get_job
/// DELETE /{id}            -> delete_job
/// GET    /{id}/output     -> subscribe_output (SSE)
/// GET    /{id}/status     -> subscribe_status (SSE)
/// PUT    /{id}/feedback   -> submit_feedback
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::create_job))
        .route("/{id}", get(jobs::get_job).delete(jobs::delete_job))
        .route("/{id}/output", get(jobs::subscribe_output))
        .route("/{id}/status", get(jobs::subscribe_status))
        .route("/{id}/feedback", put(jobs::submit_feedback))
}
