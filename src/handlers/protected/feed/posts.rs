use axum::extract::{Query, State};

use crate::middleware::{ApiResponse, ApiResult};
use crate::pagination::{Page, PageQuery};
use crate::services::feed_service::PostListResponse;
use crate::services::FeedService;
use crate::state::AppState;

/// GET /feed/posts?page=N - one page of posts, newest first
pub async fn posts_get(State(state): State<AppState>, Query(query): Query<PageQuery>) -> ApiResult<PostListResponse> {
    let page = Page::from_query(query.page.as_deref(), state.config.feed.per_page);
    let response = FeedService::new(&state).list_posts(page).await?;
    Ok(ApiResponse::success(response))
}
