use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;

use shared_models::entities::{AppointmentStatus, DoctorId};

/// Counters reported by one run of a scheduled job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub job: String,
    pub selected: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn new(job: &str) -> Self {
        Self {
            job: job.to_string(),
            ..Default::default()
        }
    }
}

/// One appointment line in a monthly report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub date: NaiveDate,
    pub patient: String,
    pub status: AppointmentStatus,
    pub diagnosis: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorReport {
    pub doctor_id: DoctorId,
    pub doctor_name: String,
    pub doctor_email: String,
    pub department: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total: usize,
    pub booked: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub success: bool,
    pub filename: String,
    pub filepath: PathBuf,
    pub records: usize,
}
