// Error handling
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use prescripto_core::{AuthError, RecordError};
use tracing::error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// A failed request, rendered as `{"success": false, "message", "code"}`.
#[derive(Debug)]
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Request body over the configured upload limit.
    pub fn too_large(limit_bytes: usize) -> Self {
        Self::new(
            "UPLOAD_ERROR",
            format!(
                "Upload exceeds the {} MiB request size limit",
                limit_bytes.div_ceil(1024 * 1024)
            ),
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(message = %message, "Request failed");
        Self::new("PERSISTENCE_ERROR", message)
    }
}

impl From<RecordError> for ApiError {
    fn from(e: RecordError) -> Self {
        match &e {
            RecordError::Persistence(_) | RecordError::Upload(_) => {
                error!(code = e.code(), error = %e, "Record operation failed");
            }
            _ => {}
        }
        Self::new(e.code(), e.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Forbidden { .. } => Self::new("FORBIDDEN", e.to_string()),
            other => Self::new("UNAUTHENTICATED", other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "success": false,
            "message": self.message,
            "code": self.code,
        }));
        (StatusCode::OK, body).into_response()
    }
}
