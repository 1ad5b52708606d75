use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::AppState;

// ============================================================================
// Token helpers
// ============================================================================

/// Claims for the regular session token, carrying the user id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub iat: usize,
    pub exp: usize,
}

/// Claims for the password-reset token, signed with the username instead of
/// the user id.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResetClaims {
    pub username: String,
    pub iat: usize,
    pub exp: usize,
}

/// Create a signed session JWT for a user id.
pub fn sign_user_token(state: &AppState, user_id: &str) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + Duration::hours(state.config.jwt.expiration_hours);
    let claims = Claims {
        id: user_id.to_string(),
        iat: now.timestamp() as usize,
        exp: exp.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.config.jwt.secret.as_bytes()),
    )
    .map_err(|_| AppError::AuthFailed)
}

/// Create a signed reset JWT carrying a username.
pub fn sign_reset_token(state: &AppState, username: &str) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + Duration::hours(state.config.jwt.expiration_hours);
    let claims = ResetClaims {
        username: username.to_string(),
        iat: now.timestamp() as usize,
        exp: exp.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.config.jwt.secret.as_bytes()),
    )
    .map_err(|_| AppError::AuthFailed)
}

fn decode_token<T: serde::de::DeserializeOwned>(state: &AppState, token: &str) -> Result<T, AppError> {
    decode::<T>(
        token,
        &DecodingKey::from_secret(state.config.jwt.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!("Failed to verify token: {:?}", e);
        AppError::AuthFailed
    })
}

/// Pull the token out of the `token` query parameter (the documented
/// contract) or, failing that, an `Authorization: Bearer` header.
fn extract_token(parts: &Parts) -> Result<String, AppError> {
    if let Some(query) = parts.uri.query() {
        for pair in query.split('&') {
            if let Some(value) = pair.strip_prefix("token=") {
                if !value.is_empty() {
                    return Ok(value.to_string());
                }
            }
        }
    }

    let auth_header = parts
        .headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::AuthFailed)?;

    if !auth_header.to_ascii_lowercase().starts_with("bearer ") {
        return Err(AppError::AuthFailed);
    }

    let token = auth_header[7..].trim();
    if token.is_empty() {
        return Err(AppError::AuthFailed);
    }

    Ok(token.to_string())
}

// ============================================================================
// Extractors
// ============================================================================

/// Authenticated caller identity for owner-scoped routes. Rejection
/// short-circuits with 403 before the handler runs.
pub struct AuthUser(pub Claims);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts)?;
        let claims = decode_token::<Claims>(state, &token)?;
        Ok(AuthUser(claims))
    }
}

/// Username-signed token identity for the password-change flow.
pub struct AuthUsername(pub ResetClaims);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUsername {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts)?;
        let claims = decode_token::<ResetClaims>(state, &token)?;
        Ok(AuthUsername(claims))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use tower::ServiceExt;

    use super::Claims;
    use crate::testing::{get, seed_user, test_app, test_state};

    const DENIED: &str = "Authorization Error: Failed to verify token.";

    #[tokio::test]
    async fn missing_token_is_rejected_with_fixed_message() {
        let state = test_state().await;
        let app = test_app(&state);

        for uri in ["/dashboards", "/sources"] {
            let (status, body) = get(&app, uri).await;
            assert_eq!(status, 403);
            assert_eq!(body["message"], DENIED);
        }
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let state = test_state().await;
        let app = test_app(&state);

        let (status, body) = get(&app, "/dashboards?token=not-a-jwt").await;
        assert_eq!(status, 403);
        assert_eq!(body["message"], DENIED);
    }

    #[tokio::test]
    async fn token_signed_with_another_secret_is_rejected() {
        let state = test_state().await;
        let app = test_app(&state);
        let (alice, _) = seed_user(&state, "alice", "alice@example.com").await;

        let now = Utc::now();
        let claims = Claims {
            id: alice.id,
            iat: now.timestamp() as usize,
            exp: (now + Duration::hours(1)).timestamp() as usize,
        };
        let forged = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"somebody-elses-secret"),
        )
        .unwrap();

        let (status, body) = get(&app, &format!("/dashboards?token={forged}")).await;
        assert_eq!(status, 403);
        assert_eq!(body["message"], DENIED);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let state = test_state().await;
        let app = test_app(&state);
        let (alice, _) = seed_user(&state, "alice", "alice@example.com").await;

        let now = Utc::now();
        let claims = Claims {
            id: alice.id,
            iat: (now - Duration::hours(2)).timestamp() as usize,
            exp: (now - Duration::hours(1)).timestamp() as usize,
        };
        let stale = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(state.config.jwt.secret.as_bytes()),
        )
        .unwrap();

        let (status, body) = get(&app, &format!("/dashboards?token={stale}")).await;
        assert_eq!(status, 403);
        assert_eq!(body["message"], DENIED);
    }

    #[tokio::test]
    async fn bearer_header_is_accepted_as_fallback() {
        let state = test_state().await;
        let app = test_app(&state);
        let (_, token) = seed_user(&state, "alice", "alice@example.com").await;

        let request = Request::builder()
            .method("GET")
            .uri("/dashboards")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn session_token_does_not_unlock_the_reset_route() {
        let state = test_state().await;
        let app = test_app(&state);
        let (_, token) = seed_user(&state, "alice", "alice@example.com").await;

        // A session token carries an id claim, not a username claim.
        let (status, body) = crate::testing::post_json(
            &app,
            &format!("/changepassword?token={token}"),
            serde_json::json!({"password": "brand-new"}),
        )
        .await;
        assert_eq!(status, 403);
        assert_eq!(body["message"], DENIED);
    }
}
