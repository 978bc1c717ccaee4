use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub image_url: String,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A post joined with the name of the user who wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostWithCreator {
    pub post: Post,
    pub creator_name: String,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub image_url: String,
    pub creator_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct PostChanges {
    pub title: String,
    pub content: String,
    pub image_url: String,
}

/// Flat row shape of `posts JOIN users`.
#[derive(Debug, FromRow)]
pub struct PostRow {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub image_url: String,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub creator_name: String,
}

impl From<PostRow> for PostWithCreator {
    fn from(row: PostRow) -> Self {
        Self {
            post: Post {
                id: row.id,
                title: row.title,
                content: row.content,
                image_url: row.image_url,
                creator_id: row.creator_id,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            creator_name: row.creator_name,
        }
    }
}
