// handlers/protected/mod.rs - Protected handlers
//
// auth and feed sit behind jwt_auth_middleware and receive an
// Extension<AuthUser>. image sits behind tag_auth_middleware and decides
// for itself from the AuthStatus tag.
pub mod auth;
pub mod feed;
pub mod form;
pub mod image;
