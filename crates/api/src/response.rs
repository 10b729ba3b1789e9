//! Shared response types for API handlers.
//!
//! All JSON responses use a `{ "data": ... }` envelope. Use [`DataResponse`]
//! instead of ad-hoc `serde_json::json!({ "data": ... })`.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use layoutgen_core::replica::{ReplicaId, REPLAY_HEADER};
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// ```ignore
/// Ok(Json(DataResponse { data: items }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Ask the network edge to replay this request on `replica`.
///
/// The edge intercepts the header, so the client never sees this response;
/// it carries no body.
pub fn reroute(replica: &ReplicaId) -> Response {
    tracing::debug!(replica = %replica, "Rerouting request to owning replica");
    match HeaderValue::from_str(&replica.replay_instruction()) {
        Ok(value) => (StatusCode::OK, [(REPLAY_HEADER, value)]).into_response(),
        Err(_) => {
            tracing::error!(replica = %replica, "Replica id is not a valid header value");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
