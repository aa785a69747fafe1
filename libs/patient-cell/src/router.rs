use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_models::auth::Role;
use shared_utils::extractor::{auth_middleware, require_role};
use shared_utils::state::AppState;

use crate::handlers::*;

pub fn patient_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/doctors", get(search_doctors))
        .route("/doctors/{doctor_id}/availability", get(doctor_availability))
        .route("/appointments", get(list_appointments))
        .route("/appointments/book", post(book_appointment))
        .route("/appointments/{appointment_id}", get(get_appointment))
        .route("/appointments/{appointment_id}/cancel", post(cancel_appointment))
        .route("/treatment-history", get(treatment_history))
        .route("/treatment-history/export", post(export_treatment_history))
        .route("/departments", get(departments))
        .layer(middleware::from_fn_with_state(Role::Patient, require_role))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
