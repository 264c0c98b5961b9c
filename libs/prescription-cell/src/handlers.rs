use std::sync::Arc;
use axum::{
    extract::{Path, Query, State, Extension},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_models::identity::DoctorContext;
use shared_models::response::success;

use crate::models::{CreatePrescriptionRequest, PrescriptionListQuery, UpdatePrescriptionRequest};
use crate::services::PrescriptionService;

#[axum::debug_handler]
pub async fn list_prescriptions(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<DoctorContext>,
    Query(query): Query<PrescriptionListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&config);

    let prescriptions = service.list_prescriptions(&ctx, query, auth.token()).await?;

    Ok(success(prescriptions))
}

#[axum::debug_handler]
pub async fn create_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<DoctorContext>,
    Json(request): Json<CreatePrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&config);

    let prescription = service.create_prescription(&ctx, request, auth.token()).await?;

    Ok(success(prescription))
}

#[axum::debug_handler]
pub async fn get_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<DoctorContext>,
    Path(prescription_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&config);

    let prescription = service.get_prescription(&ctx, prescription_id, auth.token()).await?;

    Ok(success(prescription))
}

#[axum::debug_handler]
pub async fn update_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<DoctorContext>,
    Path(prescription_id): Path<i64>,
    Json(request): Json<UpdatePrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&config);

    let prescription = service.update_prescription(&ctx, prescription_id, request, auth.token()).await?;

    Ok(success(prescription))
}

#[axum::debug_handler]
pub async fn delete_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<DoctorContext>,
    Path(prescription_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&config);

    service.delete_prescription(&ctx, prescription_id, auth.token()).await?;

    Ok(success(json!({ "id": prescription_id, "deleted": true })))
}

#[axum::debug_handler]
pub async fn download_prescription_pdf(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<DoctorContext>,
    Path(prescription_id): Path<i64>,
) -> Result<Response, AppError> {
    let service = PrescriptionService::new(&config);

    let pdf = service.export_pdf(&ctx, prescription_id, auth.token()).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"prescription-{}.pdf\"", prescription_id),
            ),
        ],
        pdf,
    ).into_response())
}
