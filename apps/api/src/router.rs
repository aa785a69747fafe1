use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use admin_cell::router::admin_routes;
use auth_cell::router::auth_routes;
use doctor_cell::router::doctor_routes;
use notification_cell::NotificationJobs;
use patient_cell::router::patient_routes;
use shared_utils::state::AppState;

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "hospital-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub fn create_router(state: Arc<AppState>, jobs: Arc<NotificationJobs>) -> Router {
    Router::new()
        .route("/", get(|| async { "Hospital Appointment API is running!" }))
        .route("/health", get(health))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/patient", patient_routes(state.clone()))
        .nest("/doctor", doctor_routes(state.clone()))
        .nest("/admin", admin_routes(state, jobs))
}
