use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use appointment_cell::models::parse_status_filter;
use appointment_cell::{AppointmentView, TreatmentRecord};
use shared_models::entities::{AppointmentStatus, DoctorId, PatientId};
use shared_models::error::AppError;
use shared_utils::validation::parse_optional_date;

// ==============================================================================
// QUERIES
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorAppointmentQuery {
    pub status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilters {
    pub status: Option<AppointmentStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl DoctorAppointmentQuery {
    pub fn into_filters(self) -> Result<AppointmentFilters, AppError> {
        Ok(AppointmentFilters {
            status: parse_status_filter(self.status.as_deref())?,
            date_from: parse_optional_date(self.date_from.as_deref())?,
            date_to: parse_optional_date(self.date_to.as_deref())?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientSearchQuery {
    pub search: Option<String>,
}

// ==============================================================================
// RESPONSES
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DoctorInfo {
    pub id: DoctorId,
    pub name: String,
    pub email: String,
    pub department: String,
    pub qualification: Option<String>,
    pub experience_years: Option<i32>,
    pub consultation_fee: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DoctorStatistics {
    pub today_appointments: usize,
    pub week_appointments: usize,
    pub total_patients_treated: usize,
    pub completed_appointments: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorDashboard {
    pub doctor_info: DoctorInfo,
    pub statistics: DoctorStatistics,
    pub today_schedule: Vec<AppointmentView>,
}

/// Clinical view of a patient as shown to their doctor.
#[derive(Debug, Clone, Serialize)]
pub struct PatientProfile {
    pub id: PatientId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub blood_group: Option<String>,
    pub emergency_contact: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentDetail {
    pub appointment: AppointmentView,
    pub patient: PatientProfile,
    pub previous_visits: Vec<TreatmentRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeenPatient {
    pub id: PatientId,
    pub name: String,
    pub age: Option<i32>,
    pub blood_group: Option<String>,
    pub phone: Option<String>,
    pub total_visits: usize,
    pub last_visit: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientHistory {
    pub patient: PatientProfile,
    pub appointment_history: Vec<AppointmentView>,
}
