use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::auth_service::{SignupRequest, SignupResponse};
use crate::services::AuthService;
use crate::state::AppState;

/// PUT /auth/signup - create an account
pub async fn signup_put(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<SignupResponse> {
    let Json(request) = payload?;
    let response = AuthService::new(&state).signup(request).await?;
    Ok(ApiResponse::created(response))
}
