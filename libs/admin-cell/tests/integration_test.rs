use std::sync::Arc;

use axum::{
    http::{Method, StatusCode},
    Router,
};
use chrono::{Days, NaiveDate};
use serde_json::{json, Value};
use tower::ServiceExt;

use admin_cell::router::admin_routes;
use notification_cell::{LogSink, NotificationJobs};
use shared_database::DEPARTMENTS_CACHE_KEY;
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
    let admin = TestUser::admin(&state).await;
    let token = TestUser::token(&state, admin).await;
    let (_, doctor_id) = TestUser::doctor(&state, "dr_strange", "Neurology").await;
    let (_, patient_id) = TestUser::patient(&state, "alice").await;
    let jobs = Arc::new(NotificationJobs::new(state.store.clone(), state.cache.clone(), Arc::new(LogSink)));

    TestApp {
        app: admin_routes(state.clone(), jobs),
        state,
        doctor_id,
        patient_id,
        token,
    }
}

fn day(offset: u64) -> NaiveDate {
    today().checked_add_days(Days::new(offset)).unwrap()
}

async fn send(app: &Router, method: Method, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = json_request(method, uri, Some(token), body);
    response_json(app.clone().oneshot(request).await.unwrap()).await
}

fn new_doctor(username: &str) -> Value {
    json!({
        "username": username,
        "email": format!("{}@hospital.test", username),
        "password": "stethoscope",
        "full_name": "Dr Meredith Grey",
        "phone": "555-0199",
        "department_id": 1,
        "qualification": "MD",
        "experience_years": 8,
        "consultation_fee": 120.0
    })
}

#[tokio::test]
async fn test_requires_admin_role() {
    let t = create_test_app().await;
    let doctor_user = t.state.store.read(|tables| tables.doctor(t.doctor_id).unwrap().user_id).await;
    let doctor_token = TestUser::token(&t.state, doctor_user).await;

    let (status, _) = send(&t.app, Method::GET, "/dashboard", &doctor_token, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_dashboard_statistics() {
    let t = create_test_app().await;
    TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(1), "09:00", AppointmentStatus::Booked, "").await;
    TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(2), "09:00", AppointmentStatus::Cancelled, "").await;
    let completed = TestUser::appointment(
        &t.state,
        t.patient_id,
        t.doctor_id,
        today().pred_opt().unwrap(),
        "09:00",
        AppointmentStatus::Completed,
        "Flu",
    )
    .await;

    let (status, body) = send(&t.app, Method::GET, "/dashboard", &t.token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["statistics"],
        json!({
            "total_doctors": 1,
            "total_patients": 1,
            "total_appointments": 3,
            "upcoming_appointments": 1,
            "completed_appointments": 1
        })
    );
    let recent = body["recent_appointments"].as_array().unwrap();
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0]["id"], completed);
}

#[tokio::test]
async fn test_add_doctor_and_duplicates() {
    let t = create_test_app().await;

    let (status, body) = send(&t.app, Method::POST, "/doctors/add", &t.token, Some(new_doctor("mgrey"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Doctor added successfully");
    assert_eq!(body["doctor"]["name"], "Dr Meredith Grey");
    assert_eq!(body["doctor"]["is_active"], true);

    let (status, body) = send(&t.app, Method::POST, "/doctors/add", &t.token, Some(new_doctor("mgrey"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username already exists");

    let mut missing_department = new_doctor("cyang");
    missing_department["department_id"] = json!(999);
    let (status, body) = send(&t.app, Method::POST, "/doctors/add", &t.token, Some(missing_department)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Department not found");

    let (status, body) = send(&t.app, Method::POST, "/doctors/add", &t.token, Some(json!({ "username": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields");
}

#[tokio::test]
async fn test_doctor_listing_filters_and_toggle() {
    let t = create_test_app().await;
    TestUser::doctor(&t.state, "dr_who", "Cardiology").await;

    let (_, body) = send(&t.app, Method::GET, "/doctors", &t.token, None).await;
    assert_eq!(body["total"], 2);

    let uri = format!("/doctors/{}/toggle-status", t.doctor_id);
    let (status, body) = send(&t.app, Method::POST, &uri, &t.token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Doctor deactivated successfully");

    let (_, body) = send(&t.app, Method::GET, "/doctors", &t.token, None).await;
    assert_eq!(body["total"], 1);
    let (_, body) = send(&t.app, Method::GET, "/doctors?status=inactive", &t.token, None).await;
    assert_eq!(body["doctors"][0]["id"], t.doctor_id);
    let (_, body) = send(&t.app, Method::GET, "/doctors?status=all&search=WHO", &t.token, None).await;
    assert_eq!(body["total"], 1);

    let (_, body) = send(&t.app, Method::POST, &uri, &t.token, None).await;
    assert_eq!(body["message"], "Doctor activated successfully");
}

#[tokio::test]
async fn test_update_doctor_and_cache_invalidation() {
    let t = create_test_app().await;
    t.state.cache.set(DEPARTMENTS_CACHE_KEY, "[]", Some(300)).await.unwrap();
    let cardiology = TestUser::department_id(&t.state, "Cardiology").await;

    let uri = format!("/doctors/{}", t.doctor_id);
    let update = json!({ "department_id": cardiology, "consultation_fee": 80.5, "bio": "Sorcerer" });
    let (status, body) = send(&t.app, Method::PUT, &uri, &t.token, Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["doctor"]["department"], "Cardiology");
    assert_eq!(body["doctor"]["consultation_fee"], 80.5);
    assert!(t.state.cache.get(DEPARTMENTS_CACHE_KEY).await.unwrap().is_none());

    let taken = json!({ "email": "alice@hospital.test" });
    let (status, body) = send(&t.app, Method::PUT, &uri, &t.token, Some(taken)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email already in use");

    let (status, _) = send(&t.app, Method::PUT, "/doctors/999", &t.token, Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_doctor_only_without_appointments() {
    let t = create_test_app().await;
    let (_, idle) = TestUser::doctor(&t.state, "dr_idle", "Cardiology").await;
    TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(1), "09:00", AppointmentStatus::Booked, "").await;

    let (status, body) = send(&t.app, Method::DELETE, &format!("/doctors/{}", t.doctor_id), &t.token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot delete a doctor with existing appointments");

    let (status, _) = send(&t.app, Method::DELETE, &format!("/doctors/{}", idle), &t.token, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&t.app, Method::GET, &format!("/doctors/{}", idle), &t.token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_patient_management() {
    let t = create_test_app().await;
    TestUser::patient(&t.state, "bob").await;
    TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(1), "09:00", AppointmentStatus::Booked, "").await;

    let (_, body) = send(&t.app, Method::GET, "/patients?search=alice@", &t.token, None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["patients"][0]["name"], "Test alice");

    let (status, body) = send(&t.app, Method::GET, &format!("/patients/{}", t.patient_id), &t.token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["patient"]["email"], "alice@hospital.test");
    assert_eq!(body["recent_appointments"].as_array().unwrap().len(), 1);

    let uri = format!("/patients/{}/toggle-status", t.patient_id);
    let (_, body) = send(&t.app, Method::POST, &uri, &t.token, None).await;
    assert_eq!(body["message"], "Patient deactivated successfully");
    let (_, body) = send(&t.app, Method::GET, "/patients", &t.token, None).await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_appointment_filters_and_cancel() {
    let t = create_test_app().await;
    let (_, bob) = TestUser::patient(&t.state, "bob").await;
    let upcoming =
        TestUser::appointment(&t.state, t.patient_id, t.doctor_id, day(3), "11:00", AppointmentStatus::Booked, "").await;
    TestUser::appointment(&t.state, bob, t.doctor_id, day(2), "10:00", AppointmentStatus::Booked, "").await;

    let (_, body) = send(&t.app, Method::GET, "/appointments", &t.token, None).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["appointments"][0]["id"], upcoming);

    let uri = format!("/appointments?patient_id={}&status=Booked", bob);
    let (_, body) = send(&t.app, Method::GET, &uri, &t.token, None).await;
    assert_eq!(body["total"], 1);

    let (status, body) = send(&t.app, Method::POST, &format!("/appointments/{}/cancel", upcoming), &t.token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["cancelled_by"], "admin");

    let (status, _) = send(&t.app, Method::POST, &format!("/appointments/{}/cancel", upcoming), &t.token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_departments_and_search() {
    let t = create_test_app().await;

    let (_, body) = send(&t.app, Method::GET, "/departments", &t.token, None).await;
    let neurology = body["departments"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["name"] == "Neurology")
        .cloned()
        .unwrap();
    assert_eq!(neurology["doctors_count"], 1);

    let (status, body) = send(&t.app, Method::GET, "/search", &t.token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Search query is required");

    let (_, body) = send(&t.app, Method::GET, "/search?q=strange", &t.token, None).await;
    assert_eq!(body["doctors"].as_array().unwrap().len(), 1);
    assert!(body["patients"].as_array().unwrap().is_empty());

    let (_, body) = send(&t.app, Method::GET, "/search?q=alice&type=patients", &t.token, None).await;
    assert!(body.get("doctors").is_none());
    assert_eq!(body["patients"][0]["id"], t.patient_id);
}

#[tokio::test]
async fn test_jobs_can_be_triggered_manually() {
    let t = create_test_app().await;
    TestUser::appointment(&t.state, t.patient_id, t.doctor_id, today(), "23:59", AppointmentStatus::Booked, "").await;

    let (status, body) = send(&t.app, Method::POST, "/jobs/reminders/run", &t.token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["sent"], 1);

    let (_, body) = send(&t.app, Method::POST, "/jobs/reminders/run", &t.token, None).await;
    assert_eq!(body["summary"]["sent"], 0);
    assert_eq!(body["summary"]["skipped"], 1);

    let (status, body) = send(&t.app, Method::POST, "/jobs/reports/run", &t.token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["job"], "monthly-reports");
}
