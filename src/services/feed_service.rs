use serde::Serialize;
use uuid::Uuid;

use crate::api::format::{CreatorView, PostView};
use crate::database::models::{NewPost, PostChanges, PostWithCreator};
use crate::error::ApiError;
use crate::images::Upload;
use crate::middleware::AuthUser;
use crate::pagination::Page;
use crate::realtime::PostEvent;
use crate::state::AppState;
use crate::validation::{min_trimmed_len, Validator};

/// Title and content as submitted, before trimming.
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListResponse {
    pub message: &'static str,
    pub posts: Vec<PostView>,
    pub total_items: i64,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub message: &'static str,
    pub post: PostView,
}

#[derive(Debug, Serialize)]
pub struct CreatedPostResponse {
    pub message: &'static str,
    pub post: PostView,
    pub creator: CreatorView,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: &'static str,
}

const POST_NOT_FOUND: &str = "Could not find post.";
const NO_FILE_PICKED: &str = "No file picked.";

enum ImageSource {
    Upload(Upload),
    Keep(String),
}

/// Feed operations. Every mutation checks that the caller owns the post
/// before touching it and announces the change on the event bus.
pub struct FeedService {
    state: AppState,
}

impl FeedService {
    pub fn new(state: &AppState) -> Self {
        Self { state: state.clone() }
    }

    pub async fn list_posts(&self, page: Page) -> Result<PostListResponse, ApiError> {
        let total_items = self.state.store.count_posts().await?;
        let posts = self
            .state
            .store
            .list_posts(page.offset(), page.limit())
            .await?
            .into_iter()
            .map(PostView::from)
            .collect();

        Ok(PostListResponse {
            message: "Fetched posts successfully.",
            posts,
            total_items,
        })
    }

    pub async fn get_post(&self, post_id: &str) -> Result<PostResponse, ApiError> {
        let post = self.load_post(post_id).await?;
        Ok(PostResponse {
            message: "Post fetched.",
            post: post.into(),
        })
    }

    pub async fn create_post(
        &self,
        user: &AuthUser,
        input: PostInput,
        image: Option<Upload>,
    ) -> Result<CreatedPostResponse, ApiError> {
        let (title, content) = self.validate(&input)?;
        let image = image
            .filter(Upload::is_allowed)
            .ok_or_else(|| ApiError::validation_error("No image provided.", vec![]))?;

        let creator = self
            .state
            .store
            .find_user_by_id(user.user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found."))?;

        let image_url = self.state.images.save(&image).await?;
        let created = self
            .state
            .store
            .create_post(NewPost {
                title,
                content,
                image_url: image_url.clone(),
                creator_id: creator.id,
            })
            .await;

        let created = match created {
            Ok(created) => created,
            Err(e) => {
                self.state.images.clear(&image_url).await;
                return Err(e.into());
            }
        };

        let post = PostView::from(created);
        tracing::info!("User {} created post {}", creator.id, post.id);
        self.state.events.publish(PostEvent::Create { post: post.clone() });

        Ok(CreatedPostResponse {
            message: "Post created successfully!",
            post,
            creator: CreatorView {
                id: creator.id,
                name: creator.name,
            },
        })
    }

    /// `existing_image` is the plain `image` form field a client sends to
    /// keep the current picture; an accepted upload takes precedence. A
    /// kept value must be the post's own image URL.
    pub async fn update_post(
        &self,
        user: &AuthUser,
        post_id: &str,
        input: PostInput,
        image: Option<Upload>,
        existing_image: Option<String>,
    ) -> Result<PostResponse, ApiError> {
        let (title, content) = self.validate(&input)?;
        let source = match (
            image.filter(Upload::is_allowed),
            existing_image.filter(|s| !s.trim().is_empty()),
        ) {
            (Some(upload), _) => ImageSource::Upload(upload),
            (None, Some(kept)) => ImageSource::Keep(kept),
            (None, None) => return Err(ApiError::validation_error(NO_FILE_PICKED, vec![])),
        };

        let current = self.load_post(post_id).await?;
        ensure_owner(&current, user)?;

        let uploaded = matches!(source, ImageSource::Upload(_));
        let image_url = match source {
            ImageSource::Upload(upload) => self.state.images.save(&upload).await?,
            ImageSource::Keep(kept) if kept.trim() == current.post.image_url => current.post.image_url.clone(),
            ImageSource::Keep(kept) => {
                tracing::warn!(
                    "User {} tried to keep image {} on post {}",
                    user.user_id,
                    kept,
                    current.post.id
                );
                return Err(ApiError::validation_error(NO_FILE_PICKED, vec![]));
            }
        };

        let updated = match self
            .state
            .store
            .update_post(
                current.post.id,
                PostChanges {
                    title,
                    content,
                    image_url: image_url.clone(),
                },
            )
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                if uploaded {
                    self.state.images.clear(&image_url).await;
                }
                return Err(e.into());
            }
        };

        if image_url != current.post.image_url {
            self.state.images.clear(&current.post.image_url).await;
        }

        let post = PostView::from(updated);
        tracing::info!("User {} updated post {}", user.user_id, post.id);
        self.state.events.publish(PostEvent::Update { post: post.clone() });

        Ok(PostResponse {
            message: "Post updated!",
            post,
        })
    }

    pub async fn delete_post(&self, user: &AuthUser, post_id: &str) -> Result<DeletedResponse, ApiError> {
        let current = self.load_post(post_id).await?;
        ensure_owner(&current, user)?;

        self.state.store.delete_post(current.post.id).await?;
        self.state.images.clear(&current.post.image_url).await;

        tracing::info!("User {} deleted post {}", user.user_id, current.post.id);
        self.state.events.publish(PostEvent::Delete { post: current.post.id });

        Ok(DeletedResponse {
            message: "Deleted post.",
        })
    }

    /// Store an upload ahead of a post mutation and return its URL.
    /// `old_path` is removed afterwards when no post uses it or the post
    /// using it belongs to `user`.
    pub async fn store_image(
        &self,
        user: &AuthUser,
        upload: &Upload,
        old_path: Option<&str>,
    ) -> Result<String, ApiError> {
        let file_path = self.state.images.save(upload).await?;

        if let Some(old_url) = old_path.and_then(|p| self.state.images.canonical_url(p)) {
            match self.state.store.find_post_by_image(&old_url).await? {
                Some(post) if post.post.creator_id != user.user_id => {
                    tracing::warn!("User {} may not clear image {} of post {}", user.user_id, old_url, post.post.id);
                }
                _ => self.state.images.clear(&old_url).await,
            }
        }

        tracing::info!("User {} stored image {}", user.user_id, file_path);
        Ok(file_path)
    }

    fn validate(&self, input: &PostInput) -> Result<(String, String), ApiError> {
        let feed = &self.state.config.feed;
        let mut validator = Validator::new();
        validator
            .check(
                min_trimmed_len(&input.title, feed.min_title_length),
                "title",
                &input.title,
                "Invalid value",
            )
            .check(
                min_trimmed_len(&input.content, feed.min_content_length),
                "content",
                &input.content,
                "Invalid value",
            );

        if !validator.is_valid() {
            return Err(ApiError::validation_error(
                "Validation failed, entered data is incorrect.",
                validator.into_errors(),
            ));
        }
        Ok((input.title.trim().to_string(), input.content.trim().to_string()))
    }

    /// Ids that do not parse can never match a post, so they are a 404.
    async fn load_post(&self, post_id: &str) -> Result<PostWithCreator, ApiError> {
        let id = Uuid::parse_str(post_id.trim()).map_err(|_| ApiError::not_found(POST_NOT_FOUND))?;
        self.state
            .store
            .find_post(id)
            .await?
            .ok_or_else(|| ApiError::not_found(POST_NOT_FOUND))
    }
}

fn ensure_owner(post: &PostWithCreator, user: &AuthUser) -> Result<(), ApiError> {
    if post.post.creator_id != user.user_id {
        tracing::warn!("User {} may not modify post {}", user.user_id, post.post.id);
        return Err(ApiError::forbidden("Not authorized!"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::models::NewUser;
    use crate::database::MemoryStore;
    use axum::http::StatusCode;
    use std::sync::Arc;

    struct Fixture {
        state: AppState,
        service: FeedService,
    }

    impl Fixture {
        fn new() -> Self {
            let mut config = AppConfig::development();
            config.server.images_dir = std::env::temp_dir().join(format!("feed-service-{}", Uuid::new_v4()));
            let state = AppState::new(config, Arc::new(MemoryStore::new()));
            let service = FeedService::new(&state);
            Self { state, service }
        }

        async fn user(&self, email: &str) -> AuthUser {
            let user = self
                .state
                .store
                .create_user(NewUser {
                    email: email.to_string(),
                    name: "Max".to_string(),
                    password_hash: "hash".to_string(),
                })
                .await
                .unwrap();
            AuthUser {
                user_id: user.id,
                email: user.email,
            }
        }

        async fn image_exists(&self, image_url: &str) -> bool {
            let file = image_url.rsplit('/').next().unwrap();
            tokio::fs::metadata(self.state.images.dir().join(file)).await.is_ok()
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(self.state.images.dir());
        }
    }

    fn input(title: &str) -> PostInput {
        PostInput {
            title: title.to_string(),
            content: "This is the content".to_string(),
        }
    }

    fn jpeg(name: &str) -> Option<Upload> {
        Some(Upload {
            file_name: name.to_string(),
            content_type: Some("image/jpeg".to_string()),
            bytes: b"jpeg".to_vec(),
        })
    }

    #[tokio::test]
    async fn create_requires_valid_input_and_image() {
        let fx = Fixture::new();
        let user = fx.user("test@test.com").await;

        let err = fx.service.create_post(&user, input("abc"), jpeg("a.jpg")).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.message(), "Validation failed, entered data is incorrect.");

        let err = fx.service.create_post(&user, input("A title"), None).await.unwrap_err();
        assert_eq!(err.message(), "No image provided.");

        let gif = Some(Upload {
            file_name: "a.gif".into(),
            content_type: Some("image/gif".into()),
            bytes: vec![1],
        });
        let err = fx.service.create_post(&user, input("A title"), gif).await.unwrap_err();
        assert_eq!(err.message(), "No image provided.");

        let ghost = AuthUser {
            user_id: Uuid::new_v4(),
            email: "ghost@test.com".into(),
        };
        let err = fx.service.create_post(&ghost, input("A title"), jpeg("a.jpg")).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "User not found.");
    }

    #[tokio::test]
    async fn create_stores_image_and_publishes() {
        let fx = Fixture::new();
        let user = fx.user("test@test.com").await;
        let mut events = fx.state.events.subscribe();

        let created = fx
            .service
            .create_post(&user, input("  A title  "), jpeg("duck.jpg"))
            .await
            .unwrap();
        assert_eq!(created.message, "Post created successfully!");
        assert_eq!(created.post.title, "A title");
        assert_eq!(created.creator.id, user.user_id);
        assert_eq!(created.post.creator.name, "Max");
        assert!(fx.image_exists(&created.post.image_url).await);

        match events.recv().await.unwrap() {
            PostEvent::Create { post } => assert_eq!(post.id, created.post.id),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn lists_pages_newest_first() {
        let fx = Fixture::new();
        let user = fx.user("test@test.com").await;
        for title in ["Post one", "Post two", "Post three"] {
            fx.service.create_post(&user, input(title), jpeg("a.jpg")).await.unwrap();
        }

        let page1 = fx.service.list_posts(Page::from_query(None, 2)).await.unwrap();
        assert_eq!(page1.message, "Fetched posts successfully.");
        assert_eq!(page1.total_items, 3);
        let titles: Vec<_> = page1.posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["Post three", "Post two"]);

        let page2 = fx.service.list_posts(Page::from_query(Some("2"), 2)).await.unwrap();
        assert_eq!(page2.posts.len(), 1);
        assert_eq!(page2.total_items, 3);
    }

    #[tokio::test]
    async fn unknown_or_malformed_ids_are_not_found() {
        let fx = Fixture::new();
        for id in ["not-a-uuid".to_string(), Uuid::new_v4().to_string()] {
            let err = fx.service.get_post(&id).await.unwrap_err();
            assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
            assert_eq!(err.message(), "Could not find post.");
        }
    }

    #[tokio::test]
    async fn only_the_creator_may_modify() {
        let fx = Fixture::new();
        let owner = fx.user("owner@test.com").await;
        let other = fx.user("other@test.com").await;
        let created = fx.service.create_post(&owner, input("A title"), jpeg("a.jpg")).await.unwrap();
        let id = created.post.id.to_string();

        let err = fx
            .service
            .update_post(&other, &id, input("New title"), None, Some(created.post.image_url.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.message(), "Not authorized!");

        let err = fx.service.delete_post(&other, &id).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        assert_eq!(fx.service.get_post(&id).await.unwrap().post.title, "A title");
    }

    #[tokio::test]
    async fn update_keeps_or_replaces_image() {
        let fx = Fixture::new();
        let user = fx.user("test@test.com").await;
        let created = fx.service.create_post(&user, input("A title"), jpeg("a.jpg")).await.unwrap();
        let id = created.post.id.to_string();
        let original_image = created.post.image_url.clone();

        let err = fx
            .service
            .update_post(&user, &id, input("New title"), None, None)
            .await
            .unwrap_err();
        assert_eq!(err.message(), "No file picked.");

        let kept = fx
            .service
            .update_post(&user, &id, input("New title"), None, Some(original_image.clone()))
            .await
            .unwrap();
        assert_eq!(kept.message, "Post updated!");
        assert_eq!(kept.post.title, "New title");
        assert_eq!(kept.post.image_url, original_image);
        assert!(fx.image_exists(&original_image).await);

        let replaced = fx
            .service
            .update_post(&user, &id, input("Newer title"), jpeg("b.jpg"), Some(original_image.clone()))
            .await
            .unwrap();
        assert_ne!(replaced.post.image_url, original_image);
        assert!(fx.image_exists(&replaced.post.image_url).await);
        assert!(!fx.image_exists(&original_image).await);
    }

    #[tokio::test]
    async fn update_cannot_adopt_another_image() {
        let fx = Fixture::new();
        let owner = fx.user("owner@test.com").await;
        let other = fx.user("other@test.com").await;
        let victim = fx.service.create_post(&owner, input("Owner post"), jpeg("a.jpg")).await.unwrap();
        let mine = fx.service.create_post(&other, input("Other post"), jpeg("b.jpg")).await.unwrap();
        let mine_id = mine.post.id.to_string();

        for kept in [victim.post.image_url.clone(), "totally-not-an-image".to_string()] {
            let err = fx
                .service
                .update_post(&other, &mine_id, input("Other post"), None, Some(kept))
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(err.message(), "No file picked.");
        }

        assert_eq!(fx.service.get_post(&mine_id).await.unwrap().post.image_url, mine.post.image_url);
        fx.service.delete_post(&other, &mine_id).await.unwrap();
        assert!(fx.image_exists(&victim.post.image_url).await);
    }

    #[tokio::test]
    async fn store_image_clears_only_own_or_unused_old_path() {
        let fx = Fixture::new();
        let owner = fx.user("owner@test.com").await;
        let other = fx.user("other@test.com").await;
        let victim = fx.service.create_post(&owner, input("Owner post"), jpeg("a.jpg")).await.unwrap();

        let stored = fx
            .service
            .store_image(&other, &jpeg("b.jpg").unwrap(), Some(victim.post.image_url.as_str()))
            .await
            .unwrap();
        assert!(stored.starts_with("images/"));
        assert!(fx.image_exists(&stored).await);
        assert!(fx.image_exists(&victim.post.image_url).await);

        let replacement = fx
            .service
            .store_image(&other, &jpeg("c.jpg").unwrap(), Some(stored.as_str()))
            .await
            .unwrap();
        assert!(fx.image_exists(&replacement).await);
        assert!(!fx.image_exists(&stored).await);

        fx.service
            .store_image(&owner, &jpeg("d.jpg").unwrap(), Some(victim.post.image_url.as_str()))
            .await
            .unwrap();
        assert!(!fx.image_exists(&victim.post.image_url).await);
    }

    #[tokio::test]
    async fn delete_removes_post_and_image() {
        let fx = Fixture::new();
        let user = fx.user("test@test.com").await;
        let created = fx.service.create_post(&user, input("A title"), jpeg("a.jpg")).await.unwrap();
        let id = created.post.id.to_string();
        let mut events = fx.state.events.subscribe();

        let deleted = fx.service.delete_post(&user, &id).await.unwrap();
        assert_eq!(deleted.message, "Deleted post.");
        assert!(!fx.image_exists(&created.post.image_url).await);
        assert_eq!(fx.service.get_post(&id).await.unwrap_err().status_code(), StatusCode::NOT_FOUND);
        assert_eq!(events.recv().await.unwrap(), PostEvent::Delete { post: created.post.id });
    }
}
