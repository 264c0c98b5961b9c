use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use auth_cell::router::auth_routes;
use doctor_cell::router::doctor_routes;
use patient_cell::router::patient_routes;
use appointment_cell::router::appointment_routes;
use prescription_cell::router::prescription_routes;
use lab_results_cell::router::lab_results_routes;
use shared_config::AppConfig;
use shared_models::error::AppError;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/prescriptions", prescription_routes(state.clone()))
        .nest("/lab-results", lab_results_routes(state))
        .fallback(|| async { AppError::NotFound("Route not found".to_string()) })
}
