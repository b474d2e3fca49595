use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Validation error ({code}): {message}")]
    Validation { code: String, message: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Client error with a machine-readable code and an explicit status.
    #[error("{message} ({code})")]
    Coded {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl AppError {
    pub fn validation(code: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn coded(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        AppError::Coded {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Coded { status, .. } => *status,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Response body. Server-side failure details only leave the process in debug builds.
    fn body(&self) -> Value {
        match self {
            AppError::Validation { code, message } | AppError::Coded { code, message, .. } => json!({
                "message": message,
                "error": code,
            }),
            AppError::Internal(detail)
            | AppError::Database(detail)
            | AppError::ExternalService(detail) => {
                if cfg!(debug_assertions) {
                    json!({ "message": "Server error", "error": detail })
                } else {
                    json!({ "message": "Server error" })
                }
            }
            AppError::Auth(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg) => json!({ "message": msg }),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        tracing::error!("Error: {}: {}", status, self);

        (status, Json(self.body())).into_response()
    }
}
