use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;

use shared_config::AppConfig;
use shared_database::{seed::seed_defaults, EntityStore, MemoryKeyValueStore};
use shared_models::auth::{Actor, Role};
use shared_models::entities::{
    Appointment, AppointmentId, AppointmentStatus, AvailabilityId, DepartmentId, Doctor, DoctorAvailability,
    DoctorId, Patient, PatientId, Treatment, User, UserId,
};

use crate::password::PasswordService;
use crate::state::AppState;

pub const TEST_PASSWORD: &str = "password123";

pub struct TestConfig {
    pub session_ttl_hours: u64,
    pub export_dir: PathBuf,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 1,
            export_dir: std::env::temp_dir().join("hospital-test-exports"),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            session_ttl_hours: self.session_ttl_hours,
            export_dir: self.export_dir.clone(),
            admin_password: TEST_PASSWORD.to_string(),
            ..AppConfig::default()
        }
    }

    /// In-memory state with the default admin and departments seeded.
    pub async fn to_state(&self) -> Arc<AppState> {
        let config = self.to_app_config();
        let store = EntityStore::in_memory();
        seed_defaults(&store, &config, test_password_hash(), now())
            .await
            .expect("seeding an empty store succeeds");
        Arc::new(AppState::new(config, store, Arc::new(MemoryKeyValueStore::new())))
    }
}

/// Argon2 is slow in debug builds; hash the shared test password once.
pub fn test_password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| PasswordService::hash_password(TEST_PASSWORD).expect("hashing succeeds"))
}

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub fn today() -> NaiveDate {
    now().date()
}

pub fn time(raw: &str) -> NaiveTime {
    NaiveTime::parse_from_str(raw, "%H:%M").expect("valid HH:MM")
}

pub struct TestUser;

impl TestUser {
    pub async fn department_id(state: &AppState, name: &str) -> DepartmentId {
        state
            .store
            .read(|t| t.department_by_name(name).map(|d| d.id))
            .await
            .expect("department is seeded")
    }

    pub async fn admin(state: &AppState) -> UserId {
        state
            .store
            .read(|t| t.users().find(|u| u.role == Role::Admin).map(|u| u.id))
            .await
            .expect("admin is seeded")
    }

    pub async fn doctor(state: &AppState, username: &str, department: &str) -> (UserId, DoctorId) {
        let department_id = Self::department_id(state, department).await;
        state
            .store
            .transaction(|t| {
                let user = t.insert_user(Self::user(username, Role::Doctor))?;
                let doctor = t.insert_doctor(Doctor {
                    id: 0,
                    user_id: user.id,
                    department_id,
                    qualification: Some("MBBS".to_string()),
                    experience_years: Some(8),
                    consultation_fee: Some(500.0),
                    bio: None,
                    created_at: now(),
                })?;
                Ok::<_, shared_database::StoreError>((user.id, doctor.id))
            })
            .await
            .expect("doctor fixture")
    }

    pub async fn patient(state: &AppState, username: &str) -> (UserId, PatientId) {
        state
            .store
            .transaction(|t| {
                let user = t.insert_user(Self::user(username, Role::Patient))?;
                let patient = t.insert_patient(Patient {
                    id: 0,
                    user_id: user.id,
                    date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1),
                    blood_group: Some("O+".to_string()),
                    emergency_contact: None,
                    medical_history: None,
                    allergies: None,
                    created_at: now(),
                })?;
                Ok::<_, shared_database::StoreError>((user.id, patient.id))
            })
            .await
            .expect("patient fixture")
    }

    pub async fn slot(
        state: &AppState,
        doctor_id: DoctorId,
        date: NaiveDate,
        start: &str,
        end: &str,
        max_appointments: u32,
    ) -> AvailabilityId {
        let (start_time, end_time) = (time(start), time(end));
        state
            .store
            .transaction(|t| {
                t.insert_availability(DoctorAvailability {
                    id: 0,
                    doctor_id,
                    date,
                    start_time,
                    end_time,
                    is_available: true,
                    max_appointments,
                    created_at: now(),
                })
                .map(|slot| slot.id)
            })
            .await
            .expect("slot fixture")
    }

    /// Inserts an appointment directly, bypassing booking rules, so tests can
    /// set up history in the past. Completed ones get a treatment with
    /// `diagnosis`.
    pub async fn appointment(
        state: &AppState,
        patient_id: PatientId,
        doctor_id: DoctorId,
        date: NaiveDate,
        at: &str,
        status: AppointmentStatus,
        diagnosis: &str,
    ) -> AppointmentId {
        let at = time(at);
        state
            .store
            .transaction(|t| {
                let appointment = t.insert_appointment(Appointment {
                    id: 0,
                    patient_id,
                    doctor_id,
                    date,
                    time: at,
                    status,
                    reason: Some("Checkup".to_string()),
                    created_at: now(),
                    updated_at: now(),
                    cancelled_at: None,
                    cancelled_by: None,
                })?;
                if status == AppointmentStatus::Completed {
                    t.upsert_treatment(Treatment {
                        id: 0,
                        appointment_id: appointment.id,
                        diagnosis: diagnosis.to_string(),
                        prescription: Some("Rest".to_string()),
                        notes: None,
                        follow_up_required: false,
                        follow_up_date: None,
                        created_at: now(),
                        updated_at: now(),
                    })?;
                }
                Ok::<_, shared_database::StoreError>(appointment.id)
            })
            .await
            .expect("appointment fixture")
    }

    pub async fn token(state: &AppState, user_id: UserId) -> String {
        let actor = state
            .store
            .read(|t| {
                let user = t.user(user_id).ok()?;
                Some(match user.role {
                    Role::Admin => Actor::Admin,
                    Role::Doctor => Actor::Doctor(t.doctor_by_user(user_id)?.id),
                    Role::Patient => Actor::Patient(t.patient_by_user(user_id)?.id),
                })
            })
            .await
            .expect("user with profile");
        state.sessions.issue(user_id, actor).await.expect("session issued")
    }

    fn user(username: &str, role: Role) -> User {
        User {
            id: 0,
            username: username.to_string(),
            email: format!("{}@hospital.test", username),
            password_hash: test_password_hash().to_string(),
            role,
            full_name: format!("Test {}", username),
            phone: Some("555-0100".to_string()),
            address: None,
            registered_at: now(),
            is_active: true,
        }
    }
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("valid request")
}

pub async fn response_json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON body")
    };
    (status, value)
}
