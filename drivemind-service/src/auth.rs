//! Bearer token authentication for API routes.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use drivemind_response::ErrorCode;
use tracing::debug;

/// Rejects requests without the configured bearer token.
///
/// Passes everything through when no token is configured.
pub async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    let rejection = match presented {
        Some(token) if token == expected => None,
        Some(_) => {
            debug!(path = %request.uri().path(), "Rejected request with an invalid token");
            Some("Invalid API token")
        }
        None => Some("Missing bearer token in the Authorization header"),
    };
    match rejection {
        Some(message) => Err(ApiError::new(ErrorCode::Unauthorized, message)),
        None => Ok(next.run(request).await),
    }
}
