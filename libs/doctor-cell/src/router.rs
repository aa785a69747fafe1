use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_models::auth::Role;
use shared_utils::extractor::{auth_middleware, require_role};
use shared_utils::state::AppState;

use crate::handlers::*;

pub fn doctor_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/appointments", get(list_appointments))
        .route("/appointments/{appointment_id}", get(get_appointment))
        .route("/appointments/{appointment_id}/complete", post(complete_appointment))
        .route("/appointments/{appointment_id}/cancel", post(cancel_appointment))
        .route("/availability", get(get_availability))
        .route("/availability/set", post(set_availability))
        .route("/availability/{slot_id}", put(update_availability).delete(delete_availability))
        .route("/patients", get(list_patients))
        .route("/patients/{patient_id}/history", get(patient_history))
        .layer(middleware::from_fn_with_state(Role::Doctor, require_role))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
