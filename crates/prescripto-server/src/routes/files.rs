//! Serves stored attachments back by the URL the store handed out.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use prescripto_core::storage::{IMAGE_FOLDER, REPORT_FOLDER};

use crate::{ApiError, ApiResult, SharedState};

pub(super) async fn download(
    State(state): State<SharedState>,
    Path((folder, name)): Path<(String, String)>,
) -> ApiResult<Response> {
    if !(folder == REPORT_FOLDER || folder == IMAGE_FOLDER) || !is_object_name(&name) {
        return Err(ApiError::not_found("File not found"));
    }

    let path = state.upload_root.join(&folder).join(&name);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("File not found"));
        }
        Err(e) => return Err(ApiError::internal(format!("Failed to read file: {}", e))),
    };

    Ok(([(header::CONTENT_TYPE, content_type(&name))], bytes).into_response())
}

/// Stored names are a sha256 hex digest with an optional extension.
fn is_object_name(name: &str) -> bool {
    let (digest, ext) = match name.split_once('.') {
        Some((digest, ext)) => (digest, Some(ext)),
        None => (name, None),
    };
    digest.len() == 64
        && digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        && ext.map_or(true, |e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn content_type(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("tif" | "tiff") => "image/tiff",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
