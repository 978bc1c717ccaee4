pub mod auth;
pub mod response;

pub use auth::{jwt_auth_middleware, tag_auth_middleware, AuthStatus, AuthUser};
pub use response::{ApiResponse, ApiResult};
