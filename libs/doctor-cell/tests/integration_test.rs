use std::sync::Arc;

use axum::{
    http::{Method, StatusCode},
    Router,
};
use chrono::{Days, NaiveDate};
use serde_json::{json, Value};
use tower::ServiceExt;

use doctor_cell::router::doctor_routes;
use shared_models::entities::{AppointmentStatus, DoctorId, PatientId};
use shared_utils::state::AppState;
use shared_utils::test_utils::{json_request, response_json, today, TestConfig, TestUser};

struct TestApp {
    app: Router,
    state: Arc<AppState>,
    doctor_id: DoctorId,
    patient_id: PatientId,
    token: String,
}

async fn create_test_app() -> TestApp {
    let state = TestConfig::default().to_state().await;
    let (user_id, doctor_id) = TestUser::doctor(&state, "dr_house", "Neurology").await;
    let (_, patient_id) = TestUser::patient(&state, "alice").await;
    let token = TestUser::token(&state, user_id).await;

    TestApp {
        app: doctor_routes(state.clone()),
        state,
        doctor_id,
        patient_id,
        token,
    }
}

fn day(offset: i64) -> NaiveDate {
    if offset >= 0 {
        today().checked_add_days(Days::new(offset as u64)).unwrap()
    } else {
        today().checked_sub_days(Days::new(offset.unsigned_abs())).unwrap()
    }
}

async fn send(app: &Router, method: Method, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = json_request(method, uri, Some(token), body);
    response_json(app.clone().oneshot(request).await.unwrap()).await
}

#[tokio::test]
async fn test_requires_doctor_role() {
    let t = create_test_app().await;
    let patient_user = t.state.store.read(|tables| tables.patient(t.patient_id).unwrap().user_id).await;
    let patient_token = TestUser::token(&t.state, patient_user).await;

    let (status, _) = send(&t.app, Method::GET, "/dashboard", &patient_token, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let anonymous = json_request(Method::GET, "/dashboard", None, None);
    assert_eq!(t.app.clone().oneshot(anonymous).await.unwrap().status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_dashboard_statistics() {
    let t = create_test_app().await;
    let (_, bob) = TestUser::patient(&t.state, "bob").await;

    TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(0), "23:30", AppointmentStatus::Booked, "").await;
    TestUser::appointment(&t.state, bob, t.doctor_id, day(0), "23:00", AppointmentStatus::Booked, "").await;
    TestUser::appointment(&t.state, bob, t.doctor_id, day(2), "10:00", AppointmentStatus::Booked, "").await;
    TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(-3), "10:00", AppointmentStatus::Completed, "Migraine").await;
    TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(-2), "10:00", AppointmentStatus::Completed, "Migraine").await;
    TestUser::appointment(&t.state, bob, t.doctor_id, day(-1), "10:00", AppointmentStatus::Cancelled, "").await;

    let (status, body) = send(&t.app, Method::GET, "/dashboard", &t.token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["doctor_info"]["department"], "Neurology");
    assert_eq!(
        body["statistics"],
        json!({
            "today_appointments": 2,
            "week_appointments": 3,
            "total_patients_treated": 1,
            "completed_appointments": 2
        })
    );
    let schedule = body["today_schedule"].as_array().unwrap();
    assert_eq!(schedule[0]["time"], "23:00");
    assert_eq!(schedule[1]["time"], "23:30");
}

#[tokio::test]
async fn test_appointment_list_filters() {
    let t = create_test_app().await;
    TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(1), "09:00", AppointmentStatus::Booked, "").await;
    TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(-5), "09:00", AppointmentStatus::Completed, "Flu").await;
    TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(-1), "09:00", AppointmentStatus::Completed, "Flu").await;

    let (status, body) = send(&t.app, Method::GET, "/appointments", &t.token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["appointments"][0]["date"], day(1).to_string());

    let uri = format!("/appointments?status=completed&date_from={}", day(-2));
    let (_, body) = send(&t.app, Method::GET, &uri, &t.token, None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["appointments"][0]["status"], "Completed");

    let (status, body) = send(&t.app, Method::GET, "/appointments?status=pending", &t.token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid status filter: pending");
}

#[tokio::test]
async fn test_appointment_detail_and_ownership() {
    let t = create_test_app().await;
    let (_, other_doctor) = TestUser::doctor(&t.state, "dr_grey", "Cardiology").await;
    let current =
        TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(1), "09:00", AppointmentStatus::Booked, "").await;
    TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(-7), "09:00", AppointmentStatus::Completed, "Tension headache").await;
    TestUser::appointment(&t.state, t.patient_id, other_doctor, day(-3), "09:00", AppointmentStatus::Completed, "Arrhythmia").await;
    let foreign =
        TestUser::appointment(&t.state, t.patient_id, other_doctor, day(1), "10:00", AppointmentStatus::Booked, "").await;

    let (status, body) = send(&t.app, Method::GET, &format!("/appointments/{}", current), &t.token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["patient"]["name"], "Test alice");
    let visits = body["previous_visits"].as_array().unwrap();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0]["diagnosis"], "Tension headache");

    let (status, _) = send(&t.app, Method::GET, &format!("/appointments/{}", foreign), &t.token, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&t.app, Method::GET, "/appointments/9999", &t.token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_complete_records_treatment_once() {
    let t = create_test_app().await;
    let id = TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(0), "00:00", AppointmentStatus::Booked, "").await;
    let uri = format!("/appointments/{}/complete", id);

    let (status, body) = send(&t.app, Method::POST, &uri, &t.token, Some(json!({ "diagnosis": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Diagnosis is required");

    let treatment = json!({
        "diagnosis": "Migraine",
        "prescription": "Ibuprofen",
        "follow_up_date": day(14).to_string()
    });
    let (status, body) = send(&t.app, Method::POST, &uri, &t.token, Some(treatment.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Appointment completed and treatment recorded successfully");
    assert_eq!(body["appointment_id"], id);

    let (status, body) = send(&t.app, Method::POST, &uri, &t.token, Some(treatment)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Appointment already completed");

    let stored = t.state.store.read(|tables| tables.treatment_for_appointment(id).cloned()).await.unwrap();
    assert!(stored.follow_up_required);

    let (status, _) = send(&t.app, Method::POST, &format!("/appointments/{}/cancel", id), &t.token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_upcoming_appointment() {
    let t = create_test_app().await;
    let id = TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(2), "10:00", AppointmentStatus::Booked, "").await;

    let (status, body) = send(&t.app, Method::POST, &format!("/appointments/{}/cancel", id), &t.token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Appointment cancelled successfully");
    assert_eq!(body["appointment"]["status"], "Cancelled");
    assert_eq!(body["appointment"]["cancelled_by"], "doctor");

    let (status, _) = send(&t.app, Method::POST, &format!("/appointments/{}/complete", id), &t.token, Some(json!({ "diagnosis": "Flu" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_availability_lifecycle() {
    let t = create_test_app().await;
    let slot = json!({
        "date": day(1).to_string(),
        "start_time": "09:00",
        "end_time": "12:00",
        "max_appointments": 4
    });

    let (status, body) = send(&t.app, Method::POST, "/availability/set", &t.token, Some(slot)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Availability set successfully");
    assert_eq!(body["created"], true);
    let slot_id = body["availability"]["id"].as_i64().unwrap();

    let beyond = json!({ "date": day(8).to_string(), "start_time": "09:00", "end_time": "12:00" });
    let (status, _) = send(&t.app, Method::POST, "/availability/set", &t.token, Some(beyond)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/availability/{}", slot_id);
    let (status, _) = send(&t.app, Method::PUT, &uri, &t.token, Some(json!({ "end_time": "08:00" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = send(&t.app, Method::PUT, &uri, &t.token, Some(json!({ "is_available": false }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Availability updated successfully");

    let (_, body) = send(&t.app, Method::GET, "/availability", &t.token, None).await;
    assert_eq!(body["availability"][0]["is_available"], false);

    TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(1), "10:00", AppointmentStatus::Booked, "").await;
    let (status, body) = send(&t.app, Method::DELETE, &uri, &t.token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot delete slot with booked appointments");
}

#[tokio::test]
async fn test_delete_free_slot() {
    let t = create_test_app().await;
    let slot_id = TestUser::slot(&t.state, t.doctor_id, day(1), "14:00", "16:00", 10).await;

    let (status, body) = send(&t.app, Method::DELETE, &format!("/availability/{}", slot_id), &t.token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Availability slot deleted successfully");

    let (_, body) = send(&t.app, Method::GET, "/availability", &t.token, None).await;
    assert!(body["availability"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_patients_seen_and_history() {
    let t = create_test_app().await;
    let (_, bob) = TestUser::patient(&t.state, "bob").await;
    let (_, stranger) = TestUser::patient(&t.state, "carol").await;
    TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(-4), "09:00", AppointmentStatus::Completed, "Migraine").await;
    TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(3), "09:00", AppointmentStatus::Booked, "").await;
    TestUser::appointment(&t.state, bob, t.doctor_id, day(2), "11:00", AppointmentStatus::Booked, "").await;

    let (status, body) = send(&t.app, Method::GET, "/patients", &t.token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    let alice = &body["patients"][0];
    assert_eq!(alice["name"], "Test alice");
    assert_eq!(alice["total_visits"], 2);
    assert_eq!(alice["last_visit"], day(-4).to_string());
    assert_eq!(body["patients"][1]["last_visit"], Value::Null);

    let (_, body) = send(&t.app, Method::GET, "/patients?search=BOB", &t.token, None).await;
    assert_eq!(body["total"], 1);

    let uri = format!("/patients/{}/history", t.patient_id);
    let (status, body) = send(&t.app, Method::GET, &uri, &t.token, None).await;
    assert_eq!(status, StatusCode::OK);
    let history = body["appointment_history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["date"], day(3).to_string());

    let (status, _) = send(&t.app, Method::GET, &format!("/patients/{}/history", stranger), &t.token, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&t.app, Method::GET, "/patients/9999/history", &t.token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
