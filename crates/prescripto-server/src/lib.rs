//! HTTP API for prescripto.
//!
//! Every response is a JSON envelope with a `success` flag. Failures are sent
//! with status 200, a human-readable `message` and a machine-readable `code`.

pub mod config;
mod error;
mod routes;

pub use error::{ApiError, ApiResult};

use axum::http::HeaderMap;
use axum::Router;
use chrono::Duration;
use prescripto_core::{AuthError, Caller, RecordResult, RecordService, TokenSigner};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared state handed to every handler.
pub struct AppState {
    pub service: Arc<RecordService>,
    pub signer: TokenSigner,
    /// Directory the attachment store writes to, served under `/files`
    pub upload_root: PathBuf,
    /// Largest request body accepted on the test-result routes
    pub max_upload_bytes: usize,
}

/// Upload body limit used unless configured otherwise (25 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(service: RecordService, signer: TokenSigner, upload_root: impl Into<PathBuf>) -> Self {
        Self {
            service: Arc::new(service),
            signer,
            upload_root: upload_root.into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Resolve the caller from the `Authorization: Bearer` header.
    fn authorize(&self, headers: &HeaderMap) -> ApiResult<Caller> {
        let token = extract_bearer_token(headers)?;
        Ok(self.signer.verify(token, self.service.now())?)
    }

    /// Issue a token using the service clock.
    pub fn issue_token(&self, caller: &Caller, ttl: Duration) -> String {
        self.signer
            .issue(&caller.subject, caller.role, self.service.now(), ttl)
    }

    /// Run a blocking record operation off the async executor.
    async fn run<T, F>(&self, op: F) -> ApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&RecordService) -> RecordResult<T> + Send + 'static,
    {
        let service = self.service.clone();
        tokio::task::spawn_blocking(move || op(&service))
            .await
            .map_err(|e| ApiError::internal(format!("Background task failed: {}", e)))?
            .map_err(ApiError::from)
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// Build the application router.
pub fn router(state: SharedState) -> Router {
    routes::router(state.max_upload_bytes).with_state(state)
}
