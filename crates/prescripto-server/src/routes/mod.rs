//! Route table.

mod files;
mod forms;
mod prescriptions;
mod test_results;

use axum::extract::DefaultBodyLimit;
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::SharedState;

/// Body limit for the JSON-only prescription routes.
pub(crate) const JSON_BODY_LIMIT: usize = 2 * 1024 * 1024;

pub(crate) fn router(max_upload_bytes: usize) -> Router<SharedState> {
    let prescriptions = Router::new()
        .route(
            "/prescriptions",
            get(prescriptions::list_all).post(prescriptions::create),
        )
        .route("/prescriptions/patient", get(prescriptions::list_for_patient))
        .route("/prescriptions/doctor", get(prescriptions::list_for_doctor))
        .route("/prescriptions/stats", get(prescriptions::stats))
        .route(
            "/prescriptions/:id",
            get(prescriptions::get_one).put(prescriptions::update),
        )
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT));

    let test_results = Router::new()
        .route(
            "/test-results",
            get(test_results::list_all).post(test_results::create),
        )
        .route("/test-results/patient", get(test_results::list_for_patient))
        .route("/test-results/doctor", get(test_results::list_for_doctor))
        .route("/test-results/stats", get(test_results::stats))
        .route(
            "/test-results/:id",
            get(test_results::get_one).put(test_results::update),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    Router::new()
        .route("/health", get(health))
        .merge(prescriptions)
        .merge(test_results)
        .route("/files/:folder/:name", get(files::download))
}

async fn health() -> Json<Value> {
    Json(json!({ "success": true, "status": "ok" }))
}

/// `{"success": true, <key>: <value>}`
fn ok<T: serde::Serialize>(key: &str, value: T) -> Json<Value> {
    let mut body = json!({ "success": true });
    body[key] = json!(value);
    Json(body)
}

/// `{"success": true, "message": <message>, <key>: <value>}`
fn ok_with_message<T: serde::Serialize>(message: &str, key: &str, value: T) -> Json<Value> {
    let Json(mut body) = ok(key, value);
    body["message"] = json!(message);
    Json(body)
}
