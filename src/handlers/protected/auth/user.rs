use axum::{extract::State, Extension};

use crate::api::format::UserView;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::AuthService;
use crate::state::AppState;

/// GET /auth/user - profile of the caller with their post ids
pub async fn user_get(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<UserView> {
    let response = AuthService::new(&state).user(&user).await?;
    Ok(ApiResponse::success(response))
}
