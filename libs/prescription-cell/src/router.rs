use std::sync::Arc;
use axum::{middleware, routing::get, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;
use doctor_cell::middleware::doctor_context_middleware;

use crate::handlers::*;

pub fn prescription_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_prescriptions).post(create_prescription))
        .route("/{id}", get(get_prescription).put(update_prescription).delete(delete_prescription))
        .route("/{id}/pdf", get(download_prescription_pdf))
        .layer(middleware::from_fn_with_state(config.clone(), doctor_context_middleware))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
