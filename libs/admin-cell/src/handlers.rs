use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use notification_cell::NotificationJobs;
use shared_models::entities::{AppointmentId, DoctorId, PatientId};
use shared_models::error::AppError;
use shared_utils::state::AppState;

use crate::models::{
    AddDoctorRequest, AdminAppointmentQuery, DoctorListQuery, PatientListQuery, SearchQuery, SearchScope,
    UpdateDoctorRequest,
};
use crate::services::AdminService;

fn toggled(kind: &str, is_active: bool) -> String {
    format!("{} {} successfully", kind, if is_active { "activated" } else { "deactivated" })
}

#[axum::debug_handler]
pub async fn dashboard(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let dashboard = AdminService::new(&state).dashboard(Utc::now().naive_utc()).await?;
    Ok(Json(json!(dashboard)))
}

// ==============================================================================
// DOCTORS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Value>, AppError> {
    let doctors = AdminService::new(&state)
        .doctors(query, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<DoctorId>,
) -> Result<Json<Value>, AppError> {
    let doctor = AdminService::new(&state).doctor(doctor_id).await?;
    Ok(Json(json!({ "doctor": doctor })))
}

#[axum::debug_handler]
pub async fn add_doctor(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddDoctorRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let doctor = AdminService::new(&state)
        .add_doctor(request, Utc::now().naive_utc())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Doctor added successfully",
            "doctor": doctor,
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<DoctorId>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = AdminService::new(&state).update_doctor(doctor_id, request).await?;
    Ok(Json(json!({
        "message": "Doctor updated successfully",
        "doctor": doctor,
    })))
}

#[axum::debug_handler]
pub async fn toggle_doctor_status(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<DoctorId>,
) -> Result<Json<Value>, AppError> {
    let is_active = AdminService::new(&state).toggle_doctor(doctor_id).await?;
    Ok(Json(json!({
        "message": toggled("Doctor", is_active),
        "is_active": is_active,
    })))
}

#[axum::debug_handler]
pub async fn delete_doctor(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<DoctorId>,
) -> Result<Json<Value>, AppError> {
    AdminService::new(&state).delete_doctor(doctor_id).await?;
    Ok(Json(json!({ "message": "Doctor deleted successfully" })))
}

// ==============================================================================
// PATIENTS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PatientListQuery>,
) -> Result<Json<Value>, AppError> {
    let patients = AdminService::new(&state)
        .patients(query, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!({
        "patients": patients,
        "total": patients.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<PatientId>,
) -> Result<Json<Value>, AppError> {
    let detail = AdminService::new(&state)
        .patient(patient_id, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!(detail)))
}

#[axum::debug_handler]
pub async fn toggle_patient_status(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<PatientId>,
) -> Result<Json<Value>, AppError> {
    let is_active = AdminService::new(&state).toggle_patient(patient_id).await?;
    Ok(Json(json!({
        "message": toggled("Patient", is_active),
        "is_active": is_active,
    })))
}

// ==============================================================================
// APPOINTMENTS, DEPARTMENTS & SEARCH
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdminAppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    let filters = query.into_filters()?;
    let appointments = AdminService::new(&state)
        .appointments(filters, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<AppointmentId>,
) -> Result<Json<Value>, AppError> {
    let appointment = AdminService::new(&state)
        .cancel_appointment(appointment_id, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!({
        "message": "Appointment cancelled successfully",
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn departments(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let departments = AdminService::new(&state).departments().await;
    Ok(Json(json!({ "departments": departments })))
}

#[axum::debug_handler]
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, AppError> {
    let scope = SearchScope::parse(query.scope.as_deref())?;
    let results = AdminService::new(&state).search(query.q, scope).await?;
    Ok(Json(json!(results)))
}

// ==============================================================================
// JOBS
// ==============================================================================

#[axum::debug_handler]
pub async fn run_reminders(Extension(jobs): Extension<Arc<NotificationJobs>>) -> Result<Json<Value>, AppError> {
    let summary = jobs.run_reminders(Utc::now().naive_utc()).await?;
    info!("Reminder job triggered manually: {} sent", summary.sent);
    Ok(Json(json!({
        "message": "Reminder job completed",
        "summary": summary,
    })))
}

#[axum::debug_handler]
pub async fn run_monthly_reports(
    Extension(jobs): Extension<Arc<NotificationJobs>>,
) -> Result<Json<Value>, AppError> {
    let summary = jobs.run_monthly_reports(Utc::now().naive_utc()).await?;
    info!("Monthly report job triggered manually: {} sent", summary.sent);
    Ok(Json(json!({
        "message": "Monthly report job completed",
        "summary": summary,
    })))
}
