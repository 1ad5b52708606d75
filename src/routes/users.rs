use std::sync::Arc;
use std::sync::OnceLock;

use axum::{extract::State, routing::post, Json, Router};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::{ResetRepository, UserRepository};
use crate::error::{AppError, AppResult};
use crate::routes::auth::{sign_reset_token, sign_user_token, AuthUsername};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(create))
        .route("/authenticate", post(authenticate))
        .route("/resetpassword", post(reset_password))
        .route("/changepassword", post(change_password))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthenticateRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct AuthenticateResponse {
    pub success: bool,
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid email pattern")
    })
}

/// Register a new user. Validation runs before any persistence attempt.
async fn create(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateUserRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if !email_regex().is_match(&request.email) {
        return Err(AppError::validation(
            "Validation Error: email must be a valid email",
        ));
    }
    if request.password.len() < 5 {
        return Err(AppError::validation(
            "Validation Error: password must be at least 5 characters",
        ));
    }

    let existing =
        UserRepository::find_by_username_or_email(&state.db, &request.username, &request.email)
            .await?;
    if existing.is_some() {
        return Err(AppError::conflict(
            "Registration Error: A user with that e-mail or username already exists.",
        ));
    }

    let hash = bcrypt::hash(&request.password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?;
    UserRepository::create(&state.db, &request.username, &request.email, &hash).await?;

    tracing::info!("Registered user {}", request.username);

    Ok(Json(serde_json::json!({"success": true})))
}

/// Verify username/password and hand out a session token.
async fn authenticate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AuthenticateRequest>,
) -> AppResult<Json<AuthenticateResponse>> {
    let user = UserRepository::find_by_username(&state.db, &request.username)
        .await?
        .ok_or_else(|| AppError::unauthenticated("Authentication Error: User not found."))?;

    let matches = bcrypt::verify(&request.password, &user.password)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password verify failed: {}", e)))?;
    if !matches {
        return Err(AppError::unauthenticated(
            "Authentication Error: Password does not match!",
        ));
    }

    let token = sign_user_token(&state, &user.id)?;

    Ok(Json(AuthenticateResponse {
        success: true,
        user: PublicUser {
            id: user.id,
            username: user.username,
            email: user.email,
        },
        token,
    }))
}

/// Issue a reset grant and mail the reset link. A repeat request overwrites
/// the previous grant.
async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> AppResult<Json<OkResponse>> {
    let user = UserRepository::find_by_username(&state.db, &request.username)
        .await?
        .ok_or_else(|| AppError::missing("Resource Error: User not found."))?;

    let token = sign_reset_token(&state, &user.username)?;
    ResetRepository::upsert(&state.db, &user.username, &token).await?;

    // Mail dispatch is best effort and must never fail the request.
    {
        let state = state.clone();
        let email = user.email.clone();
        let username = user.username.clone();
        tokio::spawn(async move {
            if let Err(e) = state.mailer.send_reset_email(&email, &username, &token).await {
                tracing::warn!("Failed to send reset e-mail to {}: {:?}", username, e);
            }
        });
    }

    Ok(Json(OkResponse {
        ok: true,
        message: "Forgot password e-mail sent.".to_string(),
    }))
}

/// Complete a password reset. Requires the username-signed token; the reset
/// row must still exist, otherwise the grant has expired.
async fn change_password(
    State(state): State<Arc<AppState>>,
    AuthUsername(claims): AuthUsername,
    Json(request): Json<ChangePasswordRequest>,
) -> AppResult<Json<OkResponse>> {
    let user = UserRepository::find_by_username(&state.db, &claims.username)
        .await?
        .ok_or_else(|| AppError::missing("Resource Error: User not found."))?;

    let reset = ResetRepository::find_by_username(&state.db, &user.username).await?;
    if reset.is_none() {
        // Message spacing is part of the observable contract.
        return Err(AppError::expired("Resource Error:Reset token has expired."));
    }

    let hash = bcrypt::hash(&request.password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?;
    UserRepository::update_password(&state.db, &user.username, &hash).await?;
    ResetRepository::delete_by_username(&state.db, &user.username).await?;

    tracing::info!("Password changed for user {}", user.username);

    Ok(Json(OkResponse {
        ok: true,
        message: "Password was changed.".to_string(),
    }))
}

// ============================================================================
// Tests
// ============================================================================
