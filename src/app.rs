use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::{AppConfig, Environment};
use crate::handlers;
use crate::images::URL_PREFIX;
use crate::middleware::{jwt_auth_middleware, tag_auth_middleware};
use crate::realtime::socket_handler;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let config = state.config.clone();

    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .route("/socket", get(socket_handler))
        .nest_service(&format!("/{}", URL_PREFIX), ServeDir::new(&config.server.images_dir))
        .merge(auth_public_routes())
        // Protected
        .merge(auth_routes(&state))
        .merge(feed_routes(&state))
        .merge(image_routes(&state))
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .with_state(state);

    if config.security.enable_cors {
        router = router.layer(cors_layer(&config));
    }
    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

fn auth_public_routes() -> Router<AppState> {
    use handlers::public::auth;

    Router::new()
        .route("/auth/signup", put(auth::signup_put))
        .route("/auth/login", post(auth::login_post))
}

fn auth_routes(state: &AppState) -> Router<AppState> {
    use handlers::protected::auth;

    Router::new()
        .route("/auth/status", get(auth::status_get).patch(auth::status_patch))
        .route("/auth/user", get(auth::user_get))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware))
}

fn feed_routes(state: &AppState) -> Router<AppState> {
    use handlers::protected::feed;

    Router::new()
        .route("/feed/posts", get(feed::posts_get))
        .route("/feed/post", post(feed::post_post))
        .route(
            "/feed/post/:postId",
            get(feed::post_get).put(feed::post_put).delete(feed::post_delete),
        )
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware))
}

fn image_routes(state: &AppState) -> Router<AppState> {
    use handlers::protected::image;

    Router::new()
        .route("/post-image", put(image::post_image_put))
        .route_layer(from_fn_with_state(state.clone(), tag_auth_middleware))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let methods = [
        Method::OPTIONS,
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
    ];
    let headers = [header::CONTENT_TYPE, header::AUTHORIZATION];

    let wildcard = config.security.cors_origins.iter().any(|o| o == "*");
    if config.environment == Environment::Development || wildcard {
        return CorsLayer::new().allow_origin(Any).allow_methods(methods).allow_headers(headers);
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "name": "Feed API (Rust)",
        "version": version,
        "description": "Posts feed backend with JWT authentication",
        "endpoints": {
            "home": "/ (public)",
            "health": "/health (public)",
            "auth": "PUT /auth/signup, POST /auth/login (public)",
            "status": "GET|PATCH /auth/status, GET /auth/user (protected)",
            "feed": "/feed/posts?page=N, /feed/post[/:postId] (protected)",
            "images": "PUT /post-image (protected), GET /images/:file (public)",
            "socket": "/socket (websocket, public)",
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let storage = state.store.backend();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "storage": storage,
                "subscribers": state.events.subscriber_count(),
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "storage": storage,
                    "message": "storage unavailable",
                })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let mut config = AppConfig::development();
        config.security.bcrypt_cost = 4;
        app(AppState::new(config, Arc::new(MemoryStore::new())))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_storage() {
        let (status, body) = send(test_app(), Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["storage"], "memory");
    }

    #[tokio::test]
    async fn feed_requires_token() {
        let (status, body) = send(test_app(), Request::get("/feed/posts").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Not authenticated.");
    }

    #[tokio::test]
    async fn post_image_requires_token() {
        let request = Request::put("/post-image")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=X")
            .body(Body::from("--X--\r\n"))
            .unwrap();
        let (status, body) = send(test_app(), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Not authenticated!");
    }

    #[tokio::test]
    async fn signup_login_and_status() {
        let app = test_app();
        let (status, body) = send(
            app.clone(),
            json_request(
                Method::PUT,
                "/auth/signup",
                json!({ "email": "test@test.com", "name": "Max", "password": "tester" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "User created!");
        let user_id = body["userId"].clone();

        let (status, body) = send(
            app.clone(),
            json_request(
                Method::POST,
                "/auth/login",
                json!({ "email": "test@test.com", "password": "tester" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["userId"], user_id);
        let token = body["token"].as_str().unwrap().to_string();

        let request = Request::get("/auth/status")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "I am new!");
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let request = Request::post("/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(test_app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }
}
