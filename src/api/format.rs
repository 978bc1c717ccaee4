use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{PostWithCreator, User};

/// Author summary embedded in every post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
}

/// Public wire format of a post:
/// `{ _id, title, content, imageUrl, creator: { _id, name }, createdAt, updatedAt }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub image_url: String,
    pub creator: CreatorView,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PostWithCreator> for PostView {
    fn from(value: PostWithCreator) -> Self {
        let post = value.post;
        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            image_url: post.image_url,
            creator: CreatorView {
                id: post.creator_id,
                name: value.creator_name,
            },
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

/// Profile of the signed-in user, with the ids of their posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub status: String,
    pub posts: Vec<Uuid>,
}

impl UserView {
    pub fn new(user: User, posts: Vec<Uuid>) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            status: user.status,
            posts,
        }
    }
}
