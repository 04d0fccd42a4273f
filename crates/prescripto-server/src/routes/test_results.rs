use axum::{
    extract::{Path, Request, State},
    http::HeaderMap,
    Json,
};
use prescripto_core::{NewTestResult, RecordVariant, TestResultPatch};
use serde_json::Value;

use super::forms::record_form;
use super::{ok, ok_with_message};
use crate::{ApiResult, SharedState};

pub(super) async fn create(
    State(state): State<SharedState>,
    request: Request,
) -> ApiResult<Json<Value>> {
    let access = state.authorize(request.headers())?.require_doctor()?;
    let (body, uploads) = record_form::<NewTestResult>(request, state.max_upload_bytes).await?;

    let test_result = state
        .run(move |service| service.create_test_result(&access, body, uploads))
        .await?;
    Ok(ok_with_message(
        "Test result created successfully",
        "testResult",
        test_result,
    ))
}

pub(super) async fn list_for_patient(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let access = state.authorize(&headers)?.require_patient()?;
    let test_results = state
        .run(move |service| service.test_results_for_patient(&access))
        .await?;
    Ok(ok("testResults", test_results))
}

pub(super) async fn list_for_doctor(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let access = state.authorize(&headers)?.require_doctor()?;
    let test_results = state
        .run(move |service| service.test_results_for_doctor(&access))
        .await?;
    Ok(ok("testResults", test_results))
}

pub(super) async fn list_all(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let access = state.authorize(&headers)?.require_admin()?;
    let test_results = state
        .run(move |service| service.all_test_results(&access))
        .await?;
    Ok(ok("testResults", test_results))
}

pub(super) async fn stats(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let access = state.authorize(&headers)?.require_admin()?;
    let stats = state
        .run(move |service| service.stats(&access, RecordVariant::TestResult))
        .await?;
    Ok(ok("stats", stats))
}

pub(super) async fn get_one(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    state.authorize(&headers)?;
    let test_result = state.run(move |service| service.test_result(&id)).await?;
    Ok(ok("testResult", test_result))
}

pub(super) async fn update(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult<Json<Value>> {
    let access = state.authorize(request.headers())?.require_doctor()?;
    let (patch, uploads) = record_form::<TestResultPatch>(request, state.max_upload_bytes).await?;

    let test_result = state
        .run(move |service| service.update_test_result(&access, &id, patch, uploads))
        .await?;
    Ok(ok_with_message(
        "Test result updated successfully",
        "testResult",
        test_result,
    ))
}
