use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use appointment_cell::models::parse_status_filter;
use appointment_cell::{AppointmentView, DoctorSummary};
use shared_models::entities::{AppointmentStatus, DepartmentId, DoctorId, PatientId, UserId};
use shared_models::error::AppError;
use shared_utils::validation::parse_optional_date;

// ==============================================================================
// FILTERS
// ==============================================================================

/// Account state filter for listings. Defaults to active accounts only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    All,
}

impl AccountStatus {
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("active") => Ok(Self::Active),
            Some("inactive") => Ok(Self::Inactive),
            Some("all") => Ok(Self::All),
            Some(other) => Err(AppError::ValidationError(format!("Invalid status filter: {}", other))),
        }
    }

    pub fn admits(self, is_active: bool) -> bool {
        match self {
            Self::Active => is_active,
            Self::Inactive => !is_active,
            Self::All => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    All,
    Doctors,
    Patients,
}

impl SearchScope {
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("all") => Ok(Self::All),
            Some("doctors") => Ok(Self::Doctors),
            Some("patients") => Ok(Self::Patients),
            Some(other) => Err(AppError::ValidationError(format!("Invalid search type: {}", other))),
        }
    }

    pub fn includes_doctors(self) -> bool {
        matches!(self, Self::All | Self::Doctors)
    }

    pub fn includes_patients(self) -> bool {
        matches!(self, Self::All | Self::Patients)
    }
}

// ==============================================================================
// QUERIES
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorListQuery {
    pub department_id: Option<DepartmentId>,
    pub search: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminAppointmentQuery {
    pub status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub doctor_id: Option<DoctorId>,
    pub patient_id: Option<PatientId>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilters {
    pub status: Option<AppointmentStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub doctor_id: Option<DoctorId>,
    pub patient_id: Option<PatientId>,
}

impl AdminAppointmentQuery {
    pub fn into_filters(self) -> Result<AppointmentFilters, AppError> {
        Ok(AppointmentFilters {
            status: parse_status_filter(self.status.as_deref())?,
            date_from: parse_optional_date(self.date_from.as_deref())?,
            date_to: parse_optional_date(self.date_to.as_deref())?,
            doctor_id: self.doctor_id,
            patient_id: self.patient_id,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub scope: Option<String>,
}

// ==============================================================================
// REQUEST BODIES
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AddDoctorRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub department_id: Option<DepartmentId>,
    pub qualification: Option<String>,
    pub experience_years: Option<i32>,
    pub consultation_fee: Option<f64>,
    pub bio: Option<String>,
}

/// Partial doctor update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDoctorRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub department_id: Option<DepartmentId>,
    pub qualification: Option<String>,
    pub experience_years: Option<i32>,
    pub consultation_fee: Option<f64>,
    pub bio: Option<String>,
}

// ==============================================================================
// RESPONSES
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdminStatistics {
    pub total_doctors: usize,
    pub total_patients: usize,
    pub total_appointments: usize,
    pub upcoming_appointments: usize,
    pub completed_appointments: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
    pub statistics: AdminStatistics,
    pub recent_appointments: Vec<AppointmentView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorListing {
    #[serde(flatten)]
    pub doctor: DoctorSummary,
    pub phone: Option<String>,
    pub upcoming_appointments: usize,
    pub completed_appointments: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorDetail {
    #[serde(flatten)]
    pub doctor: DoctorSummary,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub registration_date: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientListing {
    pub id: PatientId,
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub blood_group: Option<String>,
    pub is_active: bool,
    pub registration_date: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientRecord {
    pub id: PatientId,
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub age: Option<i32>,
    pub blood_group: Option<String>,
    pub emergency_contact: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub is_active: bool,
    pub registration_date: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientDetail {
    pub patient: PatientRecord,
    pub recent_appointments: Vec<AppointmentView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorHit {
    pub id: DoctorId,
    pub name: String,
    pub department: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientHit {
    pub id: PatientId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctors: Option<Vec<DoctorHit>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patients: Option<Vec<PatientHit>>,
}
