// libs/notification-cell/src/services/reports.rs
use chrono::{Datelike, NaiveDate};
use tracing::warn;

use shared_database::Tables;
use shared_models::entities::AppointmentStatus;

use crate::models::{DoctorReport, ReportRow};

/// First and last day of the calendar month before the one containing `today`.
pub fn previous_month(today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let last = today.with_day(1)?.pred_opt()?;
    Some((last.with_day(1)?, last))
}

/// Builds one report per active doctor for appointments dated within
/// `start..=end`. Doctors with a dangling user or department are skipped.
pub fn build_monthly_reports(tables: &Tables, start: NaiveDate, end: NaiveDate) -> Vec<DoctorReport> {
    let mut reports: Vec<DoctorReport> = tables
        .doctors()
        .filter_map(|doctor| {
            let user = tables.user(doctor.user_id).ok()?;
            if !user.is_active {
                return None;
            }
            let department = match tables.department(doctor.department_id) {
                Ok(department) => department,
                Err(_) => {
                    warn!("Skipping report for doctor {}: department missing", doctor.id);
                    return None;
                }
            };

            let mut appointments: Vec<_> = tables
                .appointments_for_doctor(doctor.id)
                .filter(|a| a.date >= start && a.date <= end)
                .collect();
            appointments.sort_by_key(|a| (a.date, a.time));

            let count = |status: AppointmentStatus| appointments.iter().filter(|a| a.status == status).count();

            let rows = appointments
                .iter()
                .filter_map(|a| {
                    let patient = tables.patient(a.patient_id).ok()?;
                    let patient_user = tables.user(patient.user_id).ok()?;
                    Some(ReportRow {
                        date: a.date,
                        patient: patient_user.full_name.clone(),
                        status: a.status,
                        diagnosis: tables
                            .treatment_for_appointment(a.id)
                            .map(|t| t.diagnosis.clone())
                            .unwrap_or_else(|| "N/A".to_string()),
                    })
                })
                .collect();

            Some(DoctorReport {
                doctor_id: doctor.id,
                doctor_name: user.full_name.clone(),
                doctor_email: user.email.clone(),
                department: department.name.clone(),
                period_start: start,
                period_end: end,
                total: appointments.len(),
                booked: count(AppointmentStatus::Booked),
                completed: count(AppointmentStatus::Completed),
                cancelled: count(AppointmentStatus::Cancelled),
                rows,
            })
        })
        .collect();

    reports.sort_by_key(|r| r.doctor_id);
    reports
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render_html(report: &DoctorReport, generated: NaiveDate) -> String {
    let rows: String = report
        .rows
        .iter()
        .map(|row| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                row.date,
                escape(&row.patient),
                row.status,
                escape(&row.diagnosis)
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<style>
body {{ font-family: Arial, sans-serif; margin: 20px; }}
h1 {{ color: #198754; }}
table {{ border-collapse: collapse; width: 100%; margin-top: 20px; }}
th, td {{ border: 1px solid #ddd; padding: 12px; text-align: left; }}
th {{ background-color: #198754; color: white; }}
</style>
</head>
<body>
<h1>Monthly Activity Report</h1>
<h2>Dr. {doctor}</h2>
<p><strong>Department:</strong> {department}</p>
<p><strong>Period:</strong> {start} to {end}</p>
<p><strong>Total Appointments:</strong> {total} | <strong>Completed:</strong> {completed} | <strong>Cancelled:</strong> {cancelled}</p>
<h3>Appointment Details</h3>
<table>
<thead><tr><th>Date</th><th>Patient Name</th><th>Status</th><th>Diagnosis</th></tr></thead>
<tbody>
{rows}</tbody>
</table>
<p style="margin-top: 30px; color: #666;">Generated by Hospital Management System on {generated}</p>
</body>
</html>
"#,
        doctor = escape(&report.doctor_name),
        department = escape(&report.department),
        start = report.period_start.format("%B %d, %Y"),
        end = report.period_end.format("%B %d, %Y"),
        total = report.total,
        completed = report.completed,
        cancelled = report.cancelled,
        rows = rows,
        generated = generated.format("%B %d, %Y"),
    )
}
