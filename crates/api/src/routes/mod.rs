pub mod customer;
pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                        list, create
/// /jobs/{id}                   get, delete
/// /jobs/{id}/output            SSE output subscription
/// /jobs/{id}/status            SSE status subscription
/// /jobs/{id}/feedback          feedback
/// /customer/status             request quota and app benefit
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/customer", customer::router())
}
