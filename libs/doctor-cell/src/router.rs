use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::middleware::doctor_context_middleware;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    // Onboarding only needs a valid session
    let onboarding_routes = Router::new()
        .route("/onboarding", post(handlers::onboard_doctor))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let profile_routes = Router::new()
        .route("/me", get(handlers::get_my_profile).put(handlers::update_my_profile))
        .layer(middleware::from_fn_with_state(state.clone(), doctor_context_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(onboarding_routes)
        .merge(profile_routes)
        .with_state(state)
}
