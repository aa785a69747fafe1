use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use appointment_cell::models::BookAppointmentRequest;
use shared_models::auth::AuthenticatedUser;
use shared_models::entities::{AppointmentId, DoctorId};
use shared_models::error::AppError;
use shared_utils::state::AppState;

use crate::models::{AppointmentFilter, AppointmentListQuery, DoctorSearchQuery};
use crate::services::PatientPortalService;

#[axum::debug_handler]
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    let patient_id = user.require_patient()?;
    let dashboard = PatientPortalService::new(&state)
        .dashboard(patient_id, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!(dashboard)))
}

#[axum::debug_handler]
pub async fn search_doctors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DoctorSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let doctors = PatientPortalService::new(&state).search_doctors(query).await?;
    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len(),
    })))
}

#[axum::debug_handler]
pub async fn doctor_availability(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<DoctorId>,
) -> Result<Json<Value>, AppError> {
    let (doctor, availability) = PatientPortalService::new(&state)
        .doctor_availability(doctor_id, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!({
        "doctor": doctor,
        "availability": availability,
    })))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let patient_id = user.require_patient()?;
    let appointment = PatientPortalService::new(&state)
        .book(patient_id, request, Utc::now().naive_utc())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Appointment booked successfully",
            "appointment": appointment,
        })),
    ))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let patient_id = user.require_patient()?;
    let filter = AppointmentFilter::parse(query.status.as_deref());
    debug!("Listing appointments for patient {} ({:?})", patient_id, filter);

    let appointments = PatientPortalService::new(&state)
        .appointments(patient_id, filter, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!({ "appointments": appointments })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(appointment_id): Path<AppointmentId>,
) -> Result<Json<Value>, AppError> {
    let patient_id = user.require_patient()?;
    let appointment = PatientPortalService::new(&state)
        .appointment(patient_id, appointment_id, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!({ "appointment": appointment })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(appointment_id): Path<AppointmentId>,
) -> Result<Json<Value>, AppError> {
    let patient_id = user.require_patient()?;
    let appointment = PatientPortalService::new(&state)
        .cancel(patient_id, appointment_id, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!({
        "message": "Appointment cancelled successfully",
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn treatment_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    let patient_id = user.require_patient()?;
    let treatments = PatientPortalService::new(&state)
        .treatment_history(patient_id)
        .await?;
    Ok(Json(json!({ "treatments": treatments })))
}

#[axum::debug_handler]
pub async fn export_treatment_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    let patient_id = user.require_patient()?;
    let export = PatientPortalService::new(&state)
        .export_treatment_history(patient_id, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!({
        "message": "Treatment history exported",
        "export": export,
    })))
}

#[axum::debug_handler]
pub async fn departments(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let departments = PatientPortalService::new(&state).departments().await?;
    Ok(Json(json!({ "departments": departments })))
}
