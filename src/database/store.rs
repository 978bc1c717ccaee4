use async_trait::async_trait;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{NewPost, NewUser, PostChanges, PostWithCreator, User};

/// Persistence seam for users and posts.
///
/// Implementations report a missing row on mutation as
/// [`DatabaseError::NotFound`] and a duplicate email as
/// [`DatabaseError::Conflict`]. Lookups return `Ok(None)` instead.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Short backend name for logs and the health endpoint.
    fn backend(&self) -> &'static str;

    async fn health_check(&self) -> Result<(), DatabaseError>;

    async fn create_user(&self, user: NewUser) -> Result<User, DatabaseError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    async fn update_user_status(&self, id: Uuid, status: &str) -> Result<User, DatabaseError>;

    /// Ids of the posts a user created, newest first.
    async fn post_ids_for_user(&self, id: Uuid) -> Result<Vec<Uuid>, DatabaseError>;

    async fn count_posts(&self) -> Result<i64, DatabaseError>;

    /// One page of posts, newest first.
    async fn list_posts(&self, offset: i64, limit: i64) -> Result<Vec<PostWithCreator>, DatabaseError>;

    async fn find_post(&self, id: Uuid) -> Result<Option<PostWithCreator>, DatabaseError>;

    /// The post whose `image_url` is exactly `image_url`, if any.
    async fn find_post_by_image(&self, image_url: &str) -> Result<Option<PostWithCreator>, DatabaseError>;

    async fn create_post(&self, post: NewPost) -> Result<PostWithCreator, DatabaseError>;

    async fn update_post(&self, id: Uuid, changes: PostChanges) -> Result<PostWithCreator, DatabaseError>;

    async fn delete_post(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Release pooled connections on shutdown.
    async fn close(&self) {}
}
