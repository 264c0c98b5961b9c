use axum::{extract::Extension, Json};
use serde_json::{json, Value};
use tracing::debug;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::response::success;

use crate::models::ExtractRequest;
use crate::services::{LabResultParser, SAMPLE_REPORT};

fn parser() -> Result<&'static LabResultParser, AppError> {
    LabResultParser::shared().map_err(|e| AppError::Internal(e.to_string()))
}

#[axum::debug_handler]
pub async fn extract_lab_results(
    Extension(user): Extension<User>,
    Json(request): Json<ExtractRequest>,
) -> Result<Json<Value>, AppError> {
    request.validate()?;
    debug!("Lab text extraction requested by {}", user.id);

    let report = parser()?.extract(&request.text);

    Ok(success(report))
}

#[axum::debug_handler]
pub async fn sample_lab_results() -> Result<Json<Value>, AppError> {
    let report = parser()?.extract(SAMPLE_REPORT);

    Ok(success(json!({
        "text": SAMPLE_REPORT,
        "report": report
    })))
}
