use std::sync::Arc;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State, Extension},
    Json,
};
use chrono::NaiveDate;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use tracing::error;

use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_models::identity::DoctorContext;
use shared_models::response::success;

use crate::models::{
    AppointmentListQuery, AvailabilityQuery, CreateAppointmentRequest,
    UpdateAppointmentRequest, UpdateStatusRequest,
};
use crate::services::{AppointmentService, AvailabilityService};

const AVAILABILITY_FAILURE: &str = "Failed to fetch availability";

/// Malformed query strings get the error envelope instead of axum's
/// plain-text rejection.
fn query_or_400<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| AppError::ValidationError(rejection.body_text()))
}

fn availability_date(query: Result<Query<AvailabilityQuery>, QueryRejection>) -> Result<NaiveDate, AppError> {
    query_or_400(query).map(|query| query.date)
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<DoctorContext>,
    query: Result<Query<AppointmentListQuery>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let query = query_or_400(query)?;
    let service = AppointmentService::new(&config);

    let appointments = service.list_appointments(&ctx, query, auth.token()).await?;

    Ok(success(appointments))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<DoctorContext>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&config);

    let appointment = service.create_appointment(&ctx, request, auth.token()).await?;

    Ok(success(appointment))
}

/// Booked "HH:mm" start times for the caller on `date`.
#[axum::debug_handler]
pub async fn get_booked_times(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<DoctorContext>,
    query: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let date = availability_date(query)?;
    let service = AvailabilityService::new(&config);

    let booked = service.booked_times_for(&ctx, date, auth.token()).await
        .map_err(|e| {
            error!("Availability lookup for doctor {} on {} failed: {}", ctx.doctor_id, date, e);
            AppError::Internal(AVAILABILITY_FAILURE.to_string())
        })?;

    Ok(success(booked))
}

#[axum::debug_handler]
pub async fn get_slot_board(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<DoctorContext>,
    query: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let date = availability_date(query)?;
    let service = AvailabilityService::new(&config);

    let slots = service.slot_board_for(&ctx, date, auth.token()).await
        .map_err(|e| {
            error!("Slot board for doctor {} on {} failed: {}", ctx.doctor_id, date, e);
            AppError::Internal(AVAILABILITY_FAILURE.to_string())
        })?;

    Ok(success(json!({
        "date": date,
        "slots": slots
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<DoctorContext>,
    Path(appointment_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&config);

    let appointment = service.get_appointment(&ctx, appointment_id, auth.token()).await?;

    Ok(success(appointment))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<DoctorContext>,
    Path(appointment_id): Path<i64>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&config);

    let appointment = service.update_appointment(&ctx, appointment_id, request, auth.token()).await?;

    Ok(success(appointment))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<DoctorContext>,
    Path(appointment_id): Path<i64>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&config);

    let appointment = service.update_status(&ctx, appointment_id, request.status, auth.token()).await?;

    Ok(success(appointment))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<DoctorContext>,
    Path(appointment_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&config);

    let appointment = service.cancel_appointment(&ctx, appointment_id, auth.token()).await?;

    Ok(success(appointment))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<DoctorContext>,
    Path(appointment_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&config);

    service.delete_appointment(&ctx, appointment_id, auth.token()).await?;

    Ok(success(json!({ "id": appointment_id, "deleted": true })))
}
