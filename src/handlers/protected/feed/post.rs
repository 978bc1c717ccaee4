use axum::extract::{multipart::MultipartRejection, Multipart, Path, State};
use axum::Extension;

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::feed_service::{CreatedPostResponse, DeletedResponse, PostResponse};
use crate::services::{FeedService, PostInput};
use crate::state::AppState;

use super::super::form::{Form, IMAGE_FIELD};

fn post_input(form: &mut Form) -> PostInput {
    PostInput {
        title: form.take_text("title").unwrap_or_default(),
        content: form.take_text("content").unwrap_or_default(),
    }
}

/// POST /feed/post - multipart `title`, `content` and an `image` file
pub async fn post_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<CreatedPostResponse> {
    let mut form = Form::read(multipart?).await?;
    let input = post_input(&mut form);
    let response = FeedService::new(&state).create_post(&user, input, form.image).await?;
    Ok(ApiResponse::created(response))
}

/// GET /feed/post/:postId
pub async fn post_get(State(state): State<AppState>, Path(post_id): Path<String>) -> ApiResult<PostResponse> {
    let response = FeedService::new(&state).get_post(&post_id).await?;
    Ok(ApiResponse::success(response))
}

/// PUT /feed/post/:postId - multipart like create; a text `image` field
/// keeps the current picture.
pub async fn post_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(post_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<PostResponse> {
    let mut form = Form::read(multipart?).await?;
    let input = post_input(&mut form);
    let existing = form.take_text(IMAGE_FIELD);
    let response = FeedService::new(&state)
        .update_post(&user, &post_id, input, form.image, existing)
        .await?;
    Ok(ApiResponse::success(response))
}

/// DELETE /feed/post/:postId
pub async fn post_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(post_id): Path<String>,
) -> ApiResult<DeletedResponse> {
    let response = FeedService::new(&state).delete_post(&user, &post_id).await?;
    Ok(ApiResponse::success(response))
}
