use axum::routing::get;
use axum::Router;

use crate::handlers::customer;
use crate::state::AppState;

/// Routes mounted at `/customer`.
///
/// ```text
/// GET    /status          -> get_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(customer::get_status))
}
