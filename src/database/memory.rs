use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Reverse;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{NewPost, NewUser, Post, PostChanges, PostWithCreator, User, DEFAULT_STATUS};
use super::store::FeedStore;

/// Process-local store backed by hash maps.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    emails: HashMap<String, Uuid>,
    posts: HashMap<Uuid, StoredPost>,
    next_seq: u64,
}

struct StoredPost {
    // Insertion order breaks ties between equal timestamps.
    seq: u64,
    post: Post,
}

impl Inner {
    fn with_creator(&self, post: &Post) -> PostWithCreator {
        let creator_name = self
            .users
            .get(&post.creator_id)
            .map(|u| u.name.clone())
            .unwrap_or_default();
        PostWithCreator {
            post: post.clone(),
            creator_name,
        }
    }

    fn newest_first(&self) -> Vec<&StoredPost> {
        let mut posts: Vec<&StoredPost> = self.posts.values().collect();
        posts.sort_by_key(|p| Reverse((p.post.created_at, p.seq)));
        posts
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let mut inner = self.inner.write().await;
        if inner.emails.contains_key(&user.email) {
            return Err(DatabaseError::Conflict(format!("email '{}' is already registered", user.email)));
        }

        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            name: user.name,
            status: DEFAULT_STATUS.to_string(),
            created_at: Utc::now(),
        };
        inner.emails.insert(created.email.clone(), created.id);
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let inner = self.inner.read().await;
        Ok(inner.emails.get(email).and_then(|id| inner.users.get(id)).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn update_user_status(&self, id: Uuid, status: &str) -> Result<User, DatabaseError> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound("User not found.".to_string()))?;
        user.status = status.to_string();
        Ok(user.clone())
    }

    async fn post_ids_for_user(&self, id: Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        let inner = self.inner.read().await;
        Ok(inner
            .newest_first()
            .into_iter()
            .filter(|p| p.post.creator_id == id)
            .map(|p| p.post.id)
            .collect())
    }

    async fn count_posts(&self) -> Result<i64, DatabaseError> {
        Ok(self.inner.read().await.posts.len() as i64)
    }

    async fn list_posts(&self, offset: i64, limit: i64) -> Result<Vec<PostWithCreator>, DatabaseError> {
        let inner = self.inner.read().await;
        Ok(inner
            .newest_first()
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|p| inner.with_creator(&p.post))
            .collect())
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostWithCreator>, DatabaseError> {
        let inner = self.inner.read().await;
        Ok(inner.posts.get(&id).map(|p| inner.with_creator(&p.post)))
    }

    async fn find_post_by_image(&self, image_url: &str) -> Result<Option<PostWithCreator>, DatabaseError> {
        let inner = self.inner.read().await;
        Ok(inner
            .posts
            .values()
            .find(|p| p.post.image_url == image_url)
            .map(|p| inner.with_creator(&p.post)))
    }

    async fn create_post(&self, post: NewPost) -> Result<PostWithCreator, DatabaseError> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&post.creator_id) {
            return Err(DatabaseError::NotFound("User not found.".to_string()));
        }

        let now = Utc::now();
        let created = Post {
            id: Uuid::new_v4(),
            title: post.title,
            content: post.content,
            image_url: post.image_url,
            creator_id: post.creator_id,
            created_at: now,
            updated_at: now,
        };
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.posts.insert(created.id, StoredPost { seq, post: created.clone() });
        Ok(inner.with_creator(&created))
    }

    async fn update_post(&self, id: Uuid, changes: PostChanges) -> Result<PostWithCreator, DatabaseError> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .posts
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound("Could not find post.".to_string()))?;
        stored.post.title = changes.title;
        stored.post.content = changes.content;
        stored.post.image_url = changes.image_url;
        stored.post.updated_at = Utc::now();
        let updated = stored.post.clone();
        Ok(inner.with_creator(&updated))
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut inner = self.inner.write().await;
        inner
            .posts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DatabaseError::NotFound("Could not find post.".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_user(store: &MemoryStore, email: &str) -> User {
        store
            .create_user(NewUser {
                email: email.to_string(),
                name: "Test".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
    }

    fn new_post(creator_id: Uuid, title: &str) -> NewPost {
        NewPost {
            title: title.to_string(),
            content: "Some content".to_string(),
            image_url: "images/a.png".to_string(),
            creator_id,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        seeded_user(&store, "test@test.com").await;
        let err = store
            .create_user(NewUser {
                email: "test@test.com".to_string(),
                name: "Again".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
    }

    #[tokio::test]
    async fn new_users_get_default_status() {
        let store = MemoryStore::new();
        let user = seeded_user(&store, "test@test.com").await;
        assert_eq!(user.status, "I am new!");

        let updated = store.update_user_status(user.id, "Busy").await.unwrap();
        assert_eq!(updated.status, "Busy");
        assert!(store.update_user_status(Uuid::new_v4(), "x").await.is_err());
    }

    #[tokio::test]
    async fn lists_newest_first_with_paging() {
        let store = MemoryStore::new();
        let user = seeded_user(&store, "test@test.com").await;
        for title in ["first", "second", "third"] {
            store.create_post(new_post(user.id, title)).await.unwrap();
        }

        assert_eq!(store.count_posts().await.unwrap(), 3);

        let page1 = store.list_posts(0, 2).await.unwrap();
        let titles: Vec<_> = page1.iter().map(|p| p.post.title.as_str()).collect();
        assert_eq!(titles, ["third", "second"]);
        assert_eq!(page1[0].creator_name, "Test");

        let page2 = store.list_posts(2, 2).await.unwrap();
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].post.title, "first");

        assert!(store.list_posts(4, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn post_ids_follow_creator() {
        let store = MemoryStore::new();
        let alice = seeded_user(&store, "alice@test.com").await;
        let bob = seeded_user(&store, "bob@test.com").await;
        let a = store.create_post(new_post(alice.id, "alice post")).await.unwrap();
        store.create_post(new_post(bob.id, "bob post")).await.unwrap();

        assert_eq!(store.post_ids_for_user(alice.id).await.unwrap(), vec![a.post.id]);

        let changes = PostChanges {
            title: "alice post".into(),
            content: "Some content".into(),
            image_url: "images/alice.png".into(),
        };
        store.update_post(a.post.id, changes).await.unwrap();
        let by_image = store.find_post_by_image("images/alice.png").await.unwrap().unwrap();
        assert_eq!(by_image.post.creator_id, alice.id);

        store.delete_post(a.post.id).await.unwrap();
        assert!(store.post_ids_for_user(alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_posts_are_not_found() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        assert!(store.find_post(id).await.unwrap().is_none());
        assert!(store.find_post_by_image("images/a.png").await.unwrap().is_none());
        assert!(matches!(store.delete_post(id).await, Err(DatabaseError::NotFound(_))));
        let changes = PostChanges {
            title: "t".into(),
            content: "c".into(),
            image_url: "i".into(),
        };
        assert!(matches!(store.update_post(id, changes).await, Err(DatabaseError::NotFound(_))));
        assert!(matches!(
            store.create_post(new_post(Uuid::new_v4(), "orphan")).await,
            Err(DatabaseError::NotFound(_))
        ));
    }
}
