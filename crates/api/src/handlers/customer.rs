//! Handlers for the caller's billing state.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/customer/status
///
/// Remaining requests this month and whether the caller holds the app
/// benefit.
pub async fn get_status(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let status = state
        .quota
        .status(&auth.user_id, auth.is_anonymous)
        .await?;
    Ok(Json(DataResponse { data: status }))
}
