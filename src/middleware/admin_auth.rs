use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::db::AppState;
use crate::error::AppError;
use crate::util::{constant_time_eq, extract_bearer_token};

/// Require `Authorization: Bearer <ADMIN_API_KEY>`.
/// With no admin key configured every request is rejected.
pub async fn admin_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.admin_api_key.as_deref() else {
        tracing::warn!("Admin request rejected: ADMIN_API_KEY is not configured");
        return Err(AppError::Unauthorized);
    };

    let presented = extract_bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;
    if !constant_time_eq(presented, expected) {
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
