use std::sync::Arc;
use axum::{middleware, routing::{get, post}, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn lab_results_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/extract", post(extract_lab_results))
        .route("/sample", get(sample_lab_results))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
