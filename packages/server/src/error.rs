use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;

use crate::engine::{EngineError, ErrorKind};

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `TOKEN_MISSING`,
    /// `TOKEN_INVALID`, `PERMISSION_DENIED`, `NOT_FOUND`, `OPERATION_DENIED`,
    /// `FLAG_POOL_EXHAUSTED`, `INTERNAL_ERROR`.
    #[schema(example = "OPERATION_DENIED")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "container limit of 3 reached")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    TokenMissing,
    TokenInvalid,
    PermissionDenied,
    NotFound(String),
    /// Refused by game or container policy.
    Denied(String),
    /// No unclaimed flag left; retryable once more flags are uploaded.
    PoolExhausted(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_MISSING",
                    message: "Authentication required".into(),
                },
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_INVALID",
                    message: "Invalid or expired token".into(),
                },
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "PERMISSION_DENIED",
                    message: "Insufficient permissions".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::Denied(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "OPERATION_DENIED",
                    message: msg,
                },
            ),
            AppError::PoolExhausted(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "FLAG_POOL_EXHAUSTED",
                    message: msg,
                },
            ),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err.kind() {
            ErrorKind::NotFound => AppError::NotFound(capitalize(&err.to_string())),
            ErrorKind::Denied => match err {
                EngineError::Denied(msg) => AppError::Denied(msg),
                other => AppError::Denied(other.to_string()),
            },
            ErrorKind::PoolExhausted => {
                tracing::warn!("{err}");
                AppError::PoolExhausted(
                    "No flags left for this challenge, please contact the organizers".into(),
                )
            }
            ErrorKind::Failed => AppError::Internal(err.to_string()),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
