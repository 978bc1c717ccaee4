use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::format::UserView;
use crate::auth::{generate_jwt, hash_password, verify_password, Claims};
use crate::database::models::{NewUser, User};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::validation::{is_email, min_trimmed_len, normalize_email, not_empty, FieldError, Validator};

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub message: &'static str,
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

const SIGNUP_FAILED: &str = "Validation failed.";
const EMAIL_TAKEN: &str = "E-Mail address already exists!";

/// Account operations: signup, login and the user's status line.
pub struct AuthService {
    state: AppState,
}

impl AuthService {
    pub fn new(state: &AppState) -> Self {
        Self { state: state.clone() }
    }

    pub async fn signup(&self, request: SignupRequest) -> Result<SignupResponse, ApiError> {
        let security = &self.state.config.security;
        let email = normalize_email(&request.email);
        let name = request.name.trim().to_string();

        let password_message = format!(
            "Password must be at least {} characters long.",
            security.min_password_length
        );

        let mut validator = Validator::new();
        validator.check(is_email(&email), "email", &request.email, "Please enter a valid email.");
        if is_email(&email) && self.state.store.find_user_by_email(&email).await?.is_some() {
            validator.push(FieldError::new("email", &request.email, EMAIL_TAKEN));
        }
        validator
            .check(
                min_trimmed_len(&request.password, security.min_password_length),
                "password",
                "",
                &password_message,
            )
            .check(not_empty(&name), "name", &request.name, "Name must not be empty.");

        if !validator.is_valid() {
            return Err(ApiError::validation_error(SIGNUP_FAILED, validator.into_errors()));
        }

        let password_hash = hash_password(&request.password, security.bcrypt_cost).await?;
        let user = self
            .state
            .store
            .create_user(NewUser {
                email,
                name,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent signup for the same address.
                DatabaseError::Conflict(_) => ApiError::validation_error(
                    SIGNUP_FAILED,
                    vec![FieldError::new("email", &request.email, EMAIL_TAKEN)],
                ),
                other => other.into(),
            })?;

        tracing::info!("Created user {}", user.id);
        Ok(SignupResponse {
            message: "User created!",
            user_id: user.id,
        })
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ApiError> {
        let email = normalize_email(&request.email);
        let user = self
            .state
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| {
                tracing::warn!("Login for unknown email");
                ApiError::unauthorized("A user with this email could not be found.")
            })?;

        if !verify_password(&request.password, &user.password_hash).await? {
            tracing::warn!("Wrong password for user {}", user.id);
            return Err(ApiError::unauthorized("Wrong password!"));
        }

        let security = &self.state.config.security;
        let claims = Claims::new(user.email.clone(), user.id, security);
        let token = generate_jwt(&claims, security)?;

        Ok(LoginResponse {
            token,
            user_id: user.id,
        })
    }

    pub async fn status(&self, auth: &AuthUser) -> Result<StatusResponse, ApiError> {
        let user = self.current_user(auth).await?;
        Ok(StatusResponse { status: user.status })
    }

    pub async fn update_status(&self, auth: &AuthUser, request: StatusRequest) -> Result<MessageResponse, ApiError> {
        let status = request.status.trim();
        if !not_empty(status) {
            return Err(ApiError::validation_error(
                "Validation failed.",
                vec![FieldError::new("status", &request.status, "Status must not be empty.")],
            ));
        }

        self.state.store.update_user_status(auth.user_id, status).await?;
        Ok(MessageResponse {
            message: "User updated.",
        })
    }

    pub async fn user(&self, auth: &AuthUser) -> Result<UserView, ApiError> {
        let user = self.current_user(auth).await?;
        let posts = self.state.store.post_ids_for_user(user.id).await?;
        Ok(UserView::new(user, posts))
    }

    async fn current_user(&self, auth: &AuthUser) -> Result<User, ApiError> {
        self.state
            .store
            .find_user_by_id(auth.user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::validate_jwt;
    use crate::config::AppConfig;
    use crate::database::MemoryStore;
    use axum::http::StatusCode;
    use std::sync::Arc;

    fn service() -> AuthService {
        let mut config = AppConfig::development();
        config.security.bcrypt_cost = 4;
        AuthService::new(&AppState::new(config, Arc::new(MemoryStore::new())))
    }

    fn signup_request(email: &str) -> SignupRequest {
        SignupRequest {
            email: email.to_string(),
            name: "Max".to_string(),
            password: "tester".to_string(),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn signup_then_login() {
        let service = service();
        let created = service.signup(signup_request("test@test.com")).await.unwrap();
        assert_eq!(created.message, "User created!");

        let login = service.login(login_request("TEST@test.com", "tester")).await.unwrap();
        assert_eq!(login.user_id, created.user_id);

        let claims = validate_jwt(&login.token, &service.state.config.security).unwrap();
        assert_eq!(claims.user_id, Some(created.user_id));
        assert_eq!(claims.email, "test@test.com");
    }

    #[tokio::test]
    async fn signup_rejects_duplicates_and_bad_input() {
        let service = service();
        service.signup(signup_request("test@test.com")).await.unwrap();

        let err = service.signup(signup_request("test@test.com")).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.to_json()["data"][0]["msg"], EMAIL_TAKEN);

        let err = service
            .signup(SignupRequest {
                email: "not-an-email".into(),
                name: "  ".into(),
                password: "abc".into(),
            })
            .await
            .unwrap_err();
        let body = err.to_json();
        assert_eq!(body["message"], "Validation failed.");
        let fields: Vec<_> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["path"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(fields, ["email", "password", "name"]);
    }

    #[tokio::test]
    async fn login_failures_are_unauthorized() {
        let service = service();
        service.signup(signup_request("test@test.com")).await.unwrap();

        let err = service.login(login_request("nobody@test.com", "tester")).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.message(), "A user with this email could not be found.");

        let err = service.login(login_request("test@test.com", "wrong")).await.unwrap_err();
        assert_eq!(err.message(), "Wrong password!");
    }

    #[tokio::test]
    async fn status_round_trip() {
        let service = service();
        let created = service.signup(signup_request("test@test.com")).await.unwrap();
        let auth = AuthUser {
            user_id: created.user_id,
            email: "test@test.com".into(),
        };

        assert_eq!(service.status(&auth).await.unwrap().status, "I am new!");
        service
            .update_status(&auth, StatusRequest { status: " Busy ".into() })
            .await
            .unwrap();
        assert_eq!(service.status(&auth).await.unwrap().status, "Busy");

        let err = service
            .update_status(&auth, StatusRequest { status: "   ".into() })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let user = service.user(&auth).await.unwrap();
        assert_eq!(user.email, "test@test.com");
        assert!(user.posts.is_empty());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let service = service();
        let auth = AuthUser {
            user_id: Uuid::new_v4(),
            email: "ghost@test.com".into(),
        };
        let err = service.status(&auth).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "User not found.");
    }
}
