use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use appointment_cell::models::{CompleteAppointmentRequest, SetAvailabilityRequest, UpdateAvailabilityRequest};
use appointment_cell::AvailabilityService;
use shared_models::auth::AuthenticatedUser;
use shared_models::entities::{AppointmentId, AvailabilityId, PatientId};
use shared_models::error::AppError;
use shared_utils::state::AppState;

use crate::models::{DoctorAppointmentQuery, PatientSearchQuery};
use crate::services::DoctorPortalService;

// ==============================================================================
// DASHBOARD & APPOINTMENTS
// ==============================================================================

#[axum::debug_handler]
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = user.require_doctor()?;
    let dashboard = DoctorPortalService::new(&state)
        .dashboard(doctor_id, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!(dashboard)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<DoctorAppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = user.require_doctor()?;
    let filters = query.into_filters()?;
    let appointments = DoctorPortalService::new(&state)
        .appointments(doctor_id, filters, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(appointment_id): Path<AppointmentId>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = user.require_doctor()?;
    let detail = DoctorPortalService::new(&state)
        .appointment(doctor_id, appointment_id, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!(detail)))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(appointment_id): Path<AppointmentId>,
    Json(request): Json<CompleteAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = user.require_doctor()?;
    let outcome = DoctorPortalService::new(&state)
        .complete(doctor_id, appointment_id, request, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!({
        "message": "Appointment completed and treatment recorded successfully",
        "appointment_id": outcome.appointment_id,
        "treatment_id": outcome.treatment_id,
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(appointment_id): Path<AppointmentId>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = user.require_doctor()?;
    let appointment = DoctorPortalService::new(&state)
        .cancel(doctor_id, appointment_id, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!({
        "message": "Appointment cancelled successfully",
        "appointment": appointment,
    })))
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = user.require_doctor()?;
    let availability = AvailabilityService::new(state.store.clone())
        .slot_report(doctor_id, Utc::now().date_naive(), false)
        .await?;
    Ok(Json(json!({ "availability": availability })))
}

#[axum::debug_handler]
pub async fn set_availability(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<SetAvailabilityRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let doctor_id = user.require_doctor()?;
    let input = request.into_input()?;
    let (slot, created) = AvailabilityService::new(state.store.clone())
        .set_availability(doctor_id, input, Utc::now().naive_utc())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Availability set successfully",
            "created": created,
            "availability": slot,
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_availability(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(slot_id): Path<AvailabilityId>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = user.require_doctor()?;
    let changes = request.into_changes()?;
    let slot = AvailabilityService::new(state.store.clone())
        .update_slot(doctor_id, slot_id, changes)
        .await?;
    Ok(Json(json!({
        "message": "Availability updated successfully",
        "availability": slot,
    })))
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(slot_id): Path<AvailabilityId>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = user.require_doctor()?;
    AvailabilityService::new(state.store.clone())
        .delete_slot(doctor_id, slot_id)
        .await?;
    info!("Doctor {} deleted availability slot {}", doctor_id, slot_id);
    Ok(Json(json!({ "message": "Availability slot deleted successfully" })))
}

// ==============================================================================
// PATIENTS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = user.require_doctor()?;
    let patients = DoctorPortalService::new(&state)
        .patients(doctor_id, query.search, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!({
        "patients": patients,
        "total": patients.len(),
    })))
}

#[axum::debug_handler]
pub async fn patient_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(patient_id): Path<PatientId>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = user.require_doctor()?;
    let history = DoctorPortalService::new(&state)
        .patient_history(doctor_id, patient_id, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!(history)))
}
