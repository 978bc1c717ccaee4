pub mod post;
pub mod posts;

pub use post::{post_delete, post_get, post_post, post_put};
pub use posts::posts_get;
