use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::auth_service::{LoginRequest, LoginResponse};
use crate::services::AuthService;
use crate::state::AppState;

/// POST /auth/login - exchange email and password for a JWT
///
/// ```json
/// { "email": "test@test.com", "password": "tester" }
/// ```
/// answers `{ "token": "...", "userId": "..." }`.
pub async fn login_post(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(request) = payload?;
    let response = AuthService::new(&state).login(request).await?;
    Ok(ApiResponse::success(response))
}
