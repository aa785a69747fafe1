use assert_matches::assert_matches;
use chrono::NaiveDate;

use notification_cell::{ExportService, NotificationError};
use shared_models::entities::AppointmentStatus;
use shared_utils::test_utils::{TestConfig, TestUser};

#[tokio::test]
async fn export_writes_completed_treatments_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let state = TestConfig::default().to_state().await;
    let (_, doctor_id) = TestUser::doctor(&state, "dr_who", "Orthopedics").await;
    let (_, patient_id) = TestUser::patient(&state, "dana").await;

    let d = |day| NaiveDate::from_ymd_opt(2024, 2, day).unwrap();
    TestUser::appointment(&state, patient_id, doctor_id, d(1), "10:00", AppointmentStatus::Completed, "Sprain").await;
    TestUser::appointment(&state, patient_id, doctor_id, d(9), "10:00", AppointmentStatus::Completed, "Fracture, left arm").await;
    TestUser::appointment(&state, patient_id, doctor_id, d(10), "10:00", AppointmentStatus::Cancelled, "").await;

    let service = ExportService::new(state.store.clone(), dir.path().join("exports"));
    let now = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(12, 0, 0).unwrap();
    let result = service.export_treatment_history(patient_id, now).await.unwrap();

    assert_eq!(result.records, 2);
    assert_eq!(result.filename, format!("patient_{}_treatment_history_20240304.csv", patient_id));

    let content = std::fs::read_to_string(&result.filepath).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines[0],
        "Patient ID,Patient Name,Appointment Date,Doctor Name,Department,Diagnosis,Prescription,Treatment Notes,Follow-up Required,Follow-up Date"
    );
    assert!(lines[1].contains("2024-02-09"));
    assert!(lines[1].contains("\"Fracture, left arm\""));
    assert!(lines[1].ends_with(",Rest,,No,"));
    assert!(lines[2].contains("Sprain"));
}

#[tokio::test]
async fn export_for_unknown_patient_fails() {
    let dir = tempfile::tempdir().unwrap();
    let state = TestConfig::default().to_state().await;
    let service = ExportService::new(state.store.clone(), dir.path());

    let now = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(12, 0, 0).unwrap();
    assert_matches!(
        service.export_treatment_history(404, now).await,
        Err(NotificationError::NotFound("Patient"))
    );
}
