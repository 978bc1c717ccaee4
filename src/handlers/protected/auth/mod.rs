pub mod status;
pub mod user;

pub use status::{status_get, status_patch};
pub use user::user_get;
