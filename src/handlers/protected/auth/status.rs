use axum::{extract::rejection::JsonRejection, extract::State, Extension, Json};

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::auth_service::{MessageResponse, StatusRequest, StatusResponse};
use crate::services::AuthService;
use crate::state::AppState;

/// GET /auth/status
pub async fn status_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<StatusResponse> {
    let response = AuthService::new(&state).status(&user).await?;
    Ok(ApiResponse::success(response))
}

/// PATCH /auth/status - `{ "status": "..." }`
pub async fn status_patch(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    let Json(request) = payload?;
    let response = AuthService::new(&state).update_status(&user, request).await?;
    Ok(ApiResponse::success(response))
}
