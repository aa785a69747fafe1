// libs/appointment-cell/src/models.rs
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::entities::{AppointmentStatus, DoctorId, TreatmentId};
use shared_models::error::AppError;
use shared_utils::validation::{non_blank, parse_date, parse_optional_date, parse_time, required};

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Doctor is inactive")]
    DoctorInactive,

    #[error("Cannot book appointments in the past")]
    InPast,

    #[error("Appointments can only be booked within the next {0} days")]
    OutsideHorizon(i64),

    #[error("Doctor is not available at this time")]
    DoctorNotAvailable,

    #[error("Time slot already booked")]
    SlotTaken,

    #[error("Availability slot is fully booked")]
    SlotFull,

    #[error("You already have an appointment at this time")]
    DuplicateBooking,

    #[error("Appointment already completed")]
    AlreadyCompleted,

    #[error("Cannot complete a cancelled appointment")]
    CompletingCancelled,

    #[error("Only booked appointments can be cancelled")]
    NotBooked,

    #[error("Cannot cancel an appointment whose time has passed")]
    AlreadyElapsed,

    #[error("Diagnosis is required")]
    DiagnosisRequired,

    #[error("Cannot set availability for past dates")]
    AvailabilityInPast,

    #[error("Can only set availability for next {0} days")]
    AvailabilityBeyondHorizon(i64),

    #[error("End time must be after start time")]
    InvalidTimeRange,

    #[error("max_appointments must be at least 1")]
    InvalidCapacity,

    #[error("Cannot delete slot with booked appointments")]
    SlotHasBookings,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppointmentError {
    /// Conflicts with existing bookings, as opposed to malformed requests.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            AppointmentError::SlotTaken | AppointmentError::SlotFull | AppointmentError::DuplicateBooking
        )
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound(_) => AppError::NotFound(err.to_string()),
            AppointmentError::Forbidden(_) => AppError::Forbidden(err.to_string()),
            AppointmentError::AlreadyCompleted
            | AppointmentError::CompletingCancelled
            | AppointmentError::NotBooked
            | AppointmentError::AlreadyElapsed => AppError::InvalidState(err.to_string()),
            AppointmentError::Store(store) => store.into(),
            ref e if e.is_conflict() => AppError::Conflict(err.to_string()),
            _ => AppError::ValidationError(err.to_string()),
        }
    }
}

// ==============================================================================
// SERVICE INPUTS
// ==============================================================================

#[derive(Debug, Clone)]
pub struct BookingInput {
    pub doctor_id: DoctorId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TreatmentInput {
    pub diagnosis: String,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub follow_up_required: bool,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct SlotInput {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub max_appointments: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SlotChanges {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub is_available: Option<bool>,
    pub max_appointments: Option<u32>,
}

pub const DEFAULT_MAX_APPOINTMENTS: u32 = 10;

pub fn hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Parses a `status` query filter case-insensitively. Missing, blank and
/// `all` mean no filter.
pub fn parse_status_filter(raw: Option<&str>) -> Result<Option<AppointmentStatus>, AppError> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("all") => Ok(None),
        Some("booked") => Ok(Some(AppointmentStatus::Booked)),
        Some("completed") => Ok(Some(AppointmentStatus::Completed)),
        Some("cancelled") => Ok(Some(AppointmentStatus::Cancelled)),
        Some(other) => Err(AppError::ValidationError(format!("Invalid status filter: {}", other))),
    }
}

// ==============================================================================
// REQUEST BODIES
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Option<DoctorId>,
    #[serde(alias = "appointment_date")]
    pub date: Option<String>,
    #[serde(alias = "appointment_time")]
    pub time: Option<String>,
    #[serde(alias = "reason_for_visit")]
    pub reason: Option<String>,
}

impl BookAppointmentRequest {
    pub fn into_input(self) -> Result<BookingInput, AppError> {
        let (doctor_id, date, time) = match (self.doctor_id, self.date, self.time) {
            (Some(doctor_id), Some(date), Some(time)) => (doctor_id, date, time),
            _ => {
                return Err(AppError::ValidationError(
                    "Doctor, date, and time are required".to_string(),
                ))
            }
        };

        Ok(BookingInput {
            doctor_id,
            date: parse_date(&date)?,
            time: parse_time(&time)?,
            reason: non_blank(self.reason),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompleteAppointmentRequest {
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    #[serde(alias = "treatment_notes")]
    pub notes: Option<String>,
    pub follow_up_required: Option<bool>,
    pub follow_up_date: Option<String>,
}

impl CompleteAppointmentRequest {
    pub fn into_input(self) -> Result<TreatmentInput, AppError> {
        let diagnosis = required("diagnosis", self.diagnosis.as_deref())
            .map_err(|_| AppError::ValidationError(AppointmentError::DiagnosisRequired.to_string()))?;
        let follow_up_date = parse_optional_date(self.follow_up_date.as_deref())?;

        Ok(TreatmentInput {
            diagnosis,
            prescription: non_blank(self.prescription),
            notes: non_blank(self.notes),
            follow_up_required: self.follow_up_required.unwrap_or(false) || follow_up_date.is_some(),
            follow_up_date,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetAvailabilityRequest {
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub is_available: Option<bool>,
    pub max_appointments: Option<u32>,
}

impl SetAvailabilityRequest {
    pub fn into_input(self) -> Result<SlotInput, AppError> {
        let (date, start, end) = match (self.date, self.start_time, self.end_time) {
            (Some(date), Some(start), Some(end)) => (date, start, end),
            _ => {
                return Err(AppError::ValidationError(
                    "Date, start_time, and end_time are required".to_string(),
                ))
            }
        };

        Ok(SlotInput {
            date: parse_date(&date)?,
            start_time: parse_time(&start)?,
            end_time: parse_time(&end)?,
            is_available: self.is_available.unwrap_or(true),
            max_appointments: self.max_appointments.unwrap_or(DEFAULT_MAX_APPOINTMENTS),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub is_available: Option<bool>,
    pub max_appointments: Option<u32>,
}

impl UpdateAvailabilityRequest {
    pub fn into_changes(self) -> Result<SlotChanges, AppError> {
        Ok(SlotChanges {
            start_time: self.start_time.as_deref().map(parse_time).transpose()?,
            end_time: self.end_time.as_deref().map(parse_time).transpose()?,
            is_available: self.is_available,
            max_appointments: self.max_appointments,
        })
    }
}

// ==============================================================================
// RESULTS
// ==============================================================================

/// Outcome of a read-only bookability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bookability {
    pub bookable: bool,
    pub reason: Option<String>,
}

impl Bookability {
    pub fn yes() -> Self {
        Self { bookable: true, reason: None }
    }

    pub fn no(reason: &AppointmentError) -> Self {
        Self { bookable: false, reason: Some(reason.to_string()) }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotOccupancy {
    pub id: i64,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub is_available: bool,
    pub max_appointments: u32,
    pub booked_count: usize,
    pub slots_available: bool,
    pub occupied_times: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub appointment_id: i64,
    pub treatment_id: TreatmentId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn errors_map_to_http_classes() {
        assert_matches!(AppError::from(AppointmentError::SlotTaken), AppError::Conflict(_));
        assert_matches!(AppError::from(AppointmentError::AlreadyCompleted), AppError::InvalidState(_));
        assert_matches!(AppError::from(AppointmentError::InPast), AppError::ValidationError(_));
        assert_matches!(AppError::from(AppointmentError::NotFound("Doctor")), AppError::NotFound(msg) if msg == "Doctor not found");
        assert_matches!(AppError::from(AppointmentError::Forbidden("nope")), AppError::Forbidden(_));
    }

    #[test]
    fn status_filter_is_case_insensitive() {
        assert_eq!(parse_status_filter(Some("Completed")).unwrap(), Some(AppointmentStatus::Completed));
        assert_eq!(parse_status_filter(Some("all")).unwrap(), None);
        assert_eq!(parse_status_filter(None).unwrap(), None);
        assert_matches!(parse_status_filter(Some("pending")), Err(AppError::ValidationError(_)));
    }

    #[test]
    fn booking_request_accepts_legacy_field_names() {
        let request: BookAppointmentRequest = serde_json::from_value(serde_json::json!({
            "doctor_id": 3,
            "appointment_date": "2024-05-01",
            "appointment_time": "09:30",
            "reason_for_visit": "  "
        }))
        .unwrap();
        let input = request.into_input().unwrap();
        assert_eq!(input.time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(input.reason, None);
    }

    #[test]
    fn follow_up_date_implies_follow_up() {
        let request = CompleteAppointmentRequest {
            diagnosis: Some("Migraine".into()),
            prescription: None,
            notes: None,
            follow_up_required: None,
            follow_up_date: Some("2024-06-01".into()),
        };
        assert!(request.into_input().unwrap().follow_up_required);
    }

    #[test]
    fn blank_diagnosis_is_rejected() {
        let request = CompleteAppointmentRequest {
            diagnosis: Some("   ".into()),
            prescription: None,
            notes: None,
            follow_up_required: None,
            follow_up_date: None,
        };
        assert_matches!(request.into_input(), Err(AppError::ValidationError(msg)) if msg == "Diagnosis is required");
    }
}
