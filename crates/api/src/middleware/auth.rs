//! Caller identity for job and billing endpoints.
//!
//! Sessions are issued by the external identity provider; this service only
//! verifies the signature and reads the subject and the guest flag.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use layoutgen_core::error::CoreError;
use layoutgen_core::types::UserId;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// The signed-in (or guest) user making the request.
///
/// Handlers that create, list, delete, or rate jobs take this as an
/// argument; a missing or bad token rejects the request with 401 before the
/// handler runs. Job reads and subscriptions do not, so shared links work.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Subject of the session token. Jobs are owned by this id.
    pub user_id: UserId,
    /// Guest sessions never hold the app benefit.
    pub is_anonymous: bool,
}

fn unauthorized(message: &str) -> AppError {
    AppError::Core(CoreError::Unauthorized(message.to_string()))
}

/// Pull the session token out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| unauthorized("Expected a Bearer session token"))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let claims = validate_token(token, &state.config.jwt)
            .map_err(|_| unauthorized("Session token is invalid or expired"))?;

        Ok(AuthUser {
            user_id: claims.sub,
            is_anonymous: claims.is_anonymous,
        })
    }
}
