use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::{validate_jwt, Claims};
use crate::config::SecurityConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated user context extracted from JWT
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
}

impl TryFrom<Claims> for AuthUser {
    type Error = ApiError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = claims
            .user_id
            .ok_or_else(|| ApiError::unauthorized("Not authenticated."))?;
        Ok(Self {
            user_id,
            email: claims.email,
        })
    }
}

/// Request tag set by [`tag_auth_middleware`]; handlers decide what an
/// anonymous caller may do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthStatus {
    Authenticated(AuthUser),
    Anonymous,
}

impl AuthStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthStatus::Authenticated(_))
    }

    pub fn require(self) -> Result<AuthUser, ApiError> {
        match self {
            AuthStatus::Authenticated(user) => Ok(user),
            AuthStatus::Anonymous => Err(ApiError::unauthorized("Not authenticated!")),
        }
    }
}

/// JWT authentication middleware that rejects the request unless the
/// `Authorization` header carries a valid token.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = authenticate(request.headers(), &state.config.security)?;
    tracing::debug!("Authenticated user {}", auth_user.user_id);

    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Lenient variant: never rejects, only tags the request with an
/// [`AuthStatus`].
pub async fn tag_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let status = match authenticate(request.headers(), &state.config.security) {
        Ok(user) => AuthStatus::Authenticated(user),
        Err(_) => AuthStatus::Anonymous,
    };

    request.extensions_mut().insert(status);
    next.run(request).await
}

fn authenticate(headers: &HeaderMap, security: &SecurityConfig) -> Result<AuthUser, ApiError> {
    let token = extract_jwt_from_headers(headers)?;
    let claims = validate_jwt(token, security)?;
    AuthUser::try_from(claims)
}

/// The token is the second space separated word of the header; the scheme
/// word itself is not inspected.
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Not authenticated."))?;

    let auth_str = auth_header.to_str().map_err(|_| {
        tracing::warn!("Authorization header is not valid ASCII");
        ApiError::unauthorized("Not authenticated.")
    })?;

    match auth_str.split(' ').nth(1) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => {
            tracing::warn!("Authorization header without a token");
            Err(ApiError::unauthorized("Not authenticated."))
        }
    }
}
