//! Request bodies for test results: plain JSON, or multipart with a JSON
//! `payload` part plus `reportFile` and `images` file parts.

use axum::extract::{FromRequest, Multipart, Request};
use axum::extract::multipart::MultipartError;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::Json;
use prescripto_core::{Attachment, Uploads};
use serde::de::DeserializeOwned;

use crate::{ApiError, ApiResult};

const PAYLOAD_FIELD: &str = "payload";
const REPORT_FIELD: &str = "reportFile";
const IMAGES_FIELD: &str = "images";

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Map a body rejection to an error; `limit` is the body limit on the route.
fn rejected(status: StatusCode, text: String, limit: usize) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::too_large(limit)
    } else {
        ApiError::validation(text)
    }
}

/// Read a JSON request body into `T`.
pub(crate) async fn json_body<T: DeserializeOwned>(request: Request, limit: usize) -> ApiResult<T> {
    let Json(body) = Json::<T>::from_request(request, &())
        .await
        .map_err(|rejection| rejected(rejection.status(), rejection.body_text(), limit))?;
    Ok(body)
}

/// Read a record payload and any attached files.
pub(crate) async fn record_form<T>(request: Request, limit: usize) -> ApiResult<(T, Uploads)>
where
    T: DeserializeOwned + Default,
{
    if !is_multipart(&request) {
        return Ok((json_body(request, limit).await?, Uploads::default()));
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| rejected(rejection.status(), rejection.body_text(), limit))?;
    let bad_part = |e: MultipartError| {
        rejected(e.status(), format!("Malformed multipart body: {}", e.body_text()), limit)
    };

    let mut payload = None;
    let mut uploads = Uploads::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_part)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            PAYLOAD_FIELD => {
                let text = field.text().await.map_err(bad_part)?;
                let parsed = serde_json::from_str(&text)
                    .map_err(|e| ApiError::validation(format!("Invalid payload: {}", e)))?;
                payload = Some(parsed);
            }
            REPORT_FIELD | IMAGES_FIELD => {
                let file_name = field.file_name().unwrap_or(name.as_str()).to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad_part)?;
                let file = Attachment::new(file_name, content_type, bytes.to_vec());

                if name == REPORT_FIELD {
                    if uploads.report_file.is_some() {
                        return Err(ApiError::validation("Only one report file can be attached"));
                    }
                    uploads.report_file = Some(file);
                } else {
                    uploads.images.push(file);
                }
            }
            // Unknown parts are ignored
            _ => {}
        }
    }

    Ok((payload.unwrap_or_default(), uploads))
}

