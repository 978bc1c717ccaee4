pub mod post;
pub mod user;

pub use post::{NewPost, Post, PostChanges, PostRow, PostWithCreator};
pub use user::{NewUser, User, DEFAULT_STATUS};
