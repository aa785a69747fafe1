// libs/notification-cell/src/services/export.rs
use std::path::PathBuf;

use chrono::NaiveDateTime;
use tracing::{info, instrument};

use shared_database::{EntityStore, Tables};
use shared_models::entities::{AppointmentStatus, PatientId};

use crate::error::NotificationError;
use crate::models::ExportResult;

pub const EXPORT_HEADERS: [&str; 10] = [
    "Patient ID",
    "Patient Name",
    "Appointment Date",
    "Doctor Name",
    "Department",
    "Diagnosis",
    "Prescription",
    "Treatment Notes",
    "Follow-up Required",
    "Follow-up Date",
];

/// Writes a patient's treatment history as CSV under the export directory.
pub struct ExportService {
    store: EntityStore,
    export_dir: PathBuf,
}

impl ExportService {
    pub fn new(store: EntityStore, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            export_dir: export_dir.into(),
        }
    }

    fn history_rows(tables: &Tables, patient_id: PatientId) -> Result<Vec<[String; 10]>, NotificationError> {
        let patient = tables
            .patient(patient_id)
            .map_err(|_| NotificationError::NotFound("Patient"))?;
        let patient_name = tables
            .user(patient.user_id)
            .map(|u| u.full_name.clone())
            .map_err(|_| NotificationError::NotFound("Patient"))?;

        let mut completed: Vec<_> = tables
            .appointments_for_patient(patient_id)
            .filter(|a| a.status == AppointmentStatus::Completed)
            .filter_map(|a| tables.treatment_for_appointment(a.id).map(|t| (a, t)))
            .collect();
        completed.sort_by(|(a, _), (b, _)| (b.date, b.time).cmp(&(a.date, a.time)));

        Ok(completed
            .into_iter()
            .map(|(appointment, treatment)| {
                let doctor = tables.doctor(appointment.doctor_id).ok();
                let doctor_name = doctor
                    .and_then(|d| tables.user(d.user_id).ok())
                    .map(|u| u.full_name.clone())
                    .unwrap_or_default();
                let department = doctor
                    .and_then(|d| tables.department(d.department_id).ok())
                    .map(|d| d.name.clone())
                    .unwrap_or_default();

                [
                    patient_id.to_string(),
                    patient_name.clone(),
                    appointment.date.format("%Y-%m-%d").to_string(),
                    doctor_name,
                    department,
                    treatment.diagnosis.clone(),
                    treatment.prescription.clone().unwrap_or_default(),
                    treatment.notes.clone().unwrap_or_default(),
                    if treatment.follow_up_required { "Yes" } else { "No" }.to_string(),
                    treatment
                        .follow_up_date
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default(),
                ]
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn export_treatment_history(
        &self,
        patient_id: PatientId,
        now: NaiveDateTime,
    ) -> Result<ExportResult, NotificationError> {
        let rows = self.store.read(|t| Self::history_rows(t, patient_id)).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(EXPORT_HEADERS)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        let content = writer
            .into_inner()
            .map_err(|e| NotificationError::Io(e.into_error()))?;

        let filename = format!(
            "patient_{}_treatment_history_{}.csv",
            patient_id,
            now.format("%Y%m%d")
        );
        tokio::fs::create_dir_all(&self.export_dir).await?;
        let filepath = self.export_dir.join(&filename);
        tokio::fs::write(&filepath, content).await?;

        info!("CSV exported: {} ({} records)", filepath.display(), rows.len());
        Ok(ExportResult {
            success: true,
            filename,
            filepath,
            records: rows.len(),
        })
    }
}
