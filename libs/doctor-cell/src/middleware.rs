use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::extractor::{extract_bearer_token, extract_user};

use crate::services::DoctorService;

/// Runs after `auth_middleware`: resolves the session user to a
/// `DoctorContext` and stores it in the request extensions.
pub async fn doctor_context_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = extract_user(&request)?;
    let token = extract_bearer_token(request.headers())?.to_string();

    let context = DoctorService::new(&config)
        .resolve_context(&user, &token)
        .await?;

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}
