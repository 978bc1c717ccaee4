use axum::extract::{multipart::MultipartRejection, Multipart, State};
use axum::http::StatusCode;
use axum::Extension;
use serde::Serialize;

use crate::middleware::{ApiResponse, ApiResult, AuthStatus};
use crate::services::FeedService;
use crate::state::AppState;

use super::form::Form;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// PUT /post-image - store an image ahead of a post mutation
///
/// Multipart `image` file plus an optional `oldPath` text field naming
/// the image being replaced. The old file is removed once the new one is
/// stored, unless another user's post still shows it.
pub async fn post_image_put(
    State(state): State<AppState>,
    Extension(status): Extension<AuthStatus>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ImageResponse> {
    let user = status.require()?;
    let mut form = Form::read(multipart?).await?;

    let Some(upload) = form.image.take().filter(|u| u.is_allowed()) else {
        return Ok(ApiResponse::success(ImageResponse {
            message: "No file provided!",
            file_path: None,
        }));
    };

    let file_path = FeedService::new(&state)
        .store_image(&user, &upload, form.text("oldPath"))
        .await?;
    Ok(ApiResponse::with_status(
        ImageResponse {
            message: "File stored.",
            file_path: Some(file_path),
        },
        StatusCode::CREATED,
    ))
}
