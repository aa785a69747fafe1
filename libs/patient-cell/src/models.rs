use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use appointment_cell::{AppointmentView, DepartmentSummary};
use shared_models::entities::{DepartmentId, PatientId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentFilter {
    Upcoming,
    Past,
    All,
}

impl AppointmentFilter {
    /// Unknown or missing values list everything.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            Some("upcoming") => AppointmentFilter::Upcoming,
            Some("past") => AppointmentFilter::Past,
            _ => AppointmentFilter::All,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorSearchQuery {
    pub department_id: Option<DepartmentId>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientInfo {
    pub id: PatientId,
    pub name: String,
    pub email: String,
    pub blood_group: Option<String>,
    pub age: Option<i32>,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientDashboard {
    pub patient_info: PatientInfo,
    pub upcoming_appointments: Vec<AppointmentView>,
    pub recent_history: Vec<AppointmentView>,
    pub departments: Vec<DepartmentSummary>,
}
