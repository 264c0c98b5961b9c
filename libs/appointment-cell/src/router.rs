use std::sync::Arc;
use axum::{middleware, routing::{get, patch, post}, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;
use doctor_cell::middleware::doctor_context_middleware;

use crate::handlers::*;

pub fn appointment_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_appointments).post(create_appointment))
        .route("/availability", get(get_booked_times))
        .route("/slots", get(get_slot_board))
        .route("/{id}", get(get_appointment).put(update_appointment).delete(delete_appointment))
        .route("/{id}/status", patch(update_appointment_status))
        .route("/{id}/cancel", post(cancel_appointment))
        .layer(middleware::from_fn_with_state(config.clone(), doctor_context_middleware))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
