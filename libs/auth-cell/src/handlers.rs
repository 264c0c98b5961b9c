use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::HeaderMap,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_models::response::success;
use shared_utils::extractor::extract_bearer_token;
use shared_utils::jwt;

use doctor_cell::services::DoctorService;

pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;
    let user = jwt::validate_token(token, &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    Ok(success(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

/// Never fails on a bad token; reports `valid: false` instead.
pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let valid = extract_bearer_token(&headers)
        .map(|token| jwt::validate_token(token, &config.supabase_jwt_secret).is_ok())
        .unwrap_or(false);

    Ok(success(json!({ "valid": valid })))
}

/// The session user plus whether a doctor profile exists for it yet.
#[axum::debug_handler]
pub async fn get_session(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("Getting session for user: {}", user.id);

    let doctor = DoctorService::new(&config)
        .find_by_auth_user(&user.id, auth.token())
        .await?;

    Ok(success(json!({
        "user": user,
        "onboarded": doctor.is_some(),
        "doctor": doctor
    })))
}
