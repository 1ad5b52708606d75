//! Shared helpers for the route tests: an in-memory database with the real
//! migrations applied, and a thin request driver over the assembled router.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::config::Config;
use crate::db::{models::User, UserRepository};
use crate::routes;
use crate::services::mailer::MailerService;
use crate::AppState;

pub async fn test_state() -> Arc<AppState> {
    // A single connection keeps every query on the same in-memory database.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect to in-memory sqlite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");

    let mut config = Config::default();
    config.jwt.secret = "test-secret".to_string();

    let mailer = MailerService::new(config.mail.clone(), config.server.frontend_url.clone());

    Arc::new(AppState {
        db: pool,
        config,
        mailer,
    })
}

pub fn test_app(state: &Arc<AppState>) -> Router {
    routes::app(state.clone())
}

/// Insert a user directly and return it with a valid session token.
/// Uses a low bcrypt cost to keep the suite fast.
pub async fn seed_user(state: &Arc<AppState>, username: &str, email: &str) -> (User, String) {
    let hash = bcrypt::hash("password", 4).expect("hash password");
    let user = UserRepository::create(&state.db, username, email, &hash)
        .await
        .expect("create user");
    let token = routes::auth::sign_user_token(state, &user.id).expect("sign token");
    (user, token)
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request");

    send(app, request).await
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");

    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router never fails");

    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);

    (status, body)
}
