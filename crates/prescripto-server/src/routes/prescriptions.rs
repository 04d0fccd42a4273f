use axum::{
    extract::{Path, Request, State},
    http::HeaderMap,
    Json,
};
use prescripto_core::{NewPrescription, PrescriptionPatch, RecordVariant};
use serde_json::Value;

use super::forms::json_body;
use super::JSON_BODY_LIMIT;
use super::{ok, ok_with_message};
use crate::{ApiResult, SharedState};

pub(super) async fn create(
    State(state): State<SharedState>,
    request: Request,
) -> ApiResult<Json<Value>> {
    let access = state.authorize(request.headers())?.require_doctor()?;
    let body: NewPrescription = json_body(request, JSON_BODY_LIMIT).await?;

    let prescription = state
        .run(move |service| service.create_prescription(&access, body))
        .await?;
    Ok(ok_with_message(
        "Prescription created successfully",
        "prescription",
        prescription,
    ))
}

pub(super) async fn list_for_patient(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let access = state.authorize(&headers)?.require_patient()?;
    let prescriptions = state
        .run(move |service| service.prescriptions_for_patient(&access))
        .await?;
    Ok(ok("prescriptions", prescriptions))
}

pub(super) async fn list_for_doctor(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let access = state.authorize(&headers)?.require_doctor()?;
    let prescriptions = state
        .run(move |service| service.prescriptions_for_doctor(&access))
        .await?;
    Ok(ok("prescriptions", prescriptions))
}

pub(super) async fn list_all(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let access = state.authorize(&headers)?.require_admin()?;
    let prescriptions = state
        .run(move |service| service.all_prescriptions(&access))
        .await?;
    Ok(ok("prescriptions", prescriptions))
}

pub(super) async fn stats(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let access = state.authorize(&headers)?.require_admin()?;
    let stats = state
        .run(move |service| service.stats(&access, RecordVariant::Prescription))
        .await?;
    Ok(ok("stats", stats))
}

pub(super) async fn get_one(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    state.authorize(&headers)?;
    let prescription = state
        .run(move |service| service.prescription(&id))
        .await?;
    Ok(ok("prescription", prescription))
}

pub(super) async fn update(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult<Json<Value>> {
    let access = state.authorize(request.headers())?.require_doctor()?;
    let patch: PrescriptionPatch = json_body(request, JSON_BODY_LIMIT).await?;

    let prescription = state
        .run(move |service| service.update_prescription(&access, &id, patch))
        .await?;
    Ok(ok_with_message(
        "Prescription updated successfully",
        "prescription",
        prescription,
    ))
}
