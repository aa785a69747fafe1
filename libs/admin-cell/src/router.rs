use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Extension, Router,
};

use notification_cell::NotificationJobs;
use shared_models::auth::Role;
use shared_utils::extractor::{auth_middleware, require_role};
use shared_utils::state::AppState;

use crate::handlers::*;

pub fn admin_routes(state: Arc<AppState>, jobs: Arc<NotificationJobs>) -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/doctors", get(list_doctors))
        .route("/doctors/add", post(add_doctor))
        .route("/doctors/{doctor_id}", get(get_doctor).put(update_doctor).delete(delete_doctor))
        .route("/doctors/{doctor_id}/toggle-status", post(toggle_doctor_status))
        .route("/patients", get(list_patients))
        .route("/patients/{patient_id}", get(get_patient))
        .route("/patients/{patient_id}/toggle-status", post(toggle_patient_status))
        .route("/appointments", get(list_appointments))
        .route("/appointments/{appointment_id}/cancel", post(cancel_appointment))
        .route("/departments", get(departments))
        .route("/search", get(search))
        .route("/jobs/reminders/run", post(run_reminders))
        .route("/jobs/reports/run", post(run_monthly_reports))
        .layer(Extension(jobs))
        .layer(middleware::from_fn_with_state(Role::Admin, require_role))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
