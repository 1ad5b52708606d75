use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// The two error channels the API exposes:
///
/// - transport-level: `AuthFailed` renders HTTP 403, unexpected errors
///   (`Database`, `Internal`) fall through the generic forwarding path and
///   render HTTP 404;
/// - application-level: `Business` renders HTTP 200 with a
///   `{status, message}` body, and clients inspect `body.status`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authorization Error: Failed to verify token.")]
    AuthFailed,

    #[error("{message}")]
    Business { status: u16, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Business {
            status: 400,
            message: message.into(),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        AppError::Business {
            status: 401,
            message: message.into(),
        }
    }

    pub fn missing(message: impl Into<String>) -> Self {
        AppError::Business {
            status: 404,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Business {
            status: 409,
            message: message.into(),
        }
    }

    pub fn expired(message: impl Into<String>) -> Self {
        AppError::Business {
            status: 410,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct AuthErrorBody {
    message: String,
}

#[derive(Serialize)]
struct BusinessErrorBody {
    status: u16,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::AuthFailed => (
                StatusCode::FORBIDDEN,
                Json(AuthErrorBody {
                    message: "Authorization Error: Failed to verify token.".to_string(),
                }),
            )
                .into_response(),
            AppError::Business { status, message } => {
                (StatusCode::OK, Json(BusinessErrorBody { status, message })).into_response()
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                StatusCode::NOT_FOUND.into_response()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                StatusCode::NOT_FOUND.into_response()
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
