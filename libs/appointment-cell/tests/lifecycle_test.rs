use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Days, Duration, NaiveDate, NaiveDateTime};

use appointment_cell::models::{AppointmentError, BookingInput, TreatmentInput};
use appointment_cell::{BookingService, LifecycleService, Resolver};
use shared_models::auth::{Actor, Role};
use shared_models::entities::{AppointmentId, AppointmentStatus, DoctorId, PatientId};
use shared_utils::state::AppState;
use shared_utils::test_utils::{time, TestConfig, TestUser};

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(8, 0, 0).unwrap()
}

fn tomorrow() -> NaiveDate {
    now().date().checked_add_days(Days::new(1)).unwrap()
}

fn treatment(diagnosis: &str) -> TreatmentInput {
    TreatmentInput {
        diagnosis: diagnosis.to_string(),
        prescription: Some("Rest".to_string()),
        notes: None,
        follow_up_required: false,
        follow_up_date: None,
    }
}

struct Fixture {
    state: Arc<AppState>,
    doctor_id: DoctorId,
    patient_id: PatientId,
    booking: BookingService,
    lifecycle: LifecycleService,
}

async fn fixture() -> Fixture {
    let state = TestConfig::default().to_state().await;
    let (_, doctor_id) = TestUser::doctor(&state, "dr_smith", "Cardiology").await;
    let (_, patient_id) = TestUser::patient(&state, "alice").await;
    TestUser::slot(&state, doctor_id, tomorrow(), "09:00", "17:00", 10).await;
    Fixture {
        booking: BookingService::new(state.store.clone()),
        lifecycle: LifecycleService::new(state.store.clone()),
        state,
        doctor_id,
        patient_id,
    }
}

impl Fixture {
    async fn book(&self, patient_id: PatientId, at: &str) -> Result<AppointmentId, AppointmentError> {
        let input = BookingInput { doctor_id: self.doctor_id, date: tomorrow(), time: time(at), reason: None };
        self.booking.book(patient_id, input, now()).await.map(|a| a.id)
    }
}

#[tokio::test]
async fn second_booking_for_same_time_is_rejected() {
    let f = fixture().await;
    let (_, bob) = TestUser::patient(&f.state, "bob").await;

    f.book(f.patient_id, "09:00").await.unwrap();
    assert_matches!(f.book(bob, "09:00").await, Err(AppointmentError::SlotTaken));
    assert_matches!(f.book(f.patient_id, "09:00").await, Err(AppointmentError::DuplicateBooking));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_for_same_time_admit_exactly_one() {
    let f = fixture().await;
    let booking = Arc::new(BookingService::new(f.state.store.clone()));

    let mut patients = Vec::new();
    for i in 0..8 {
        let (_, patient_id) = TestUser::patient(&f.state, &format!("patient{}", i)).await;
        patients.push(patient_id);
    }

    let attempts = patients.into_iter().map(|patient_id| {
        let booking = booking.clone();
        let doctor_id = f.doctor_id;
        tokio::spawn(async move {
            let input = BookingInput { doctor_id, date: tomorrow(), time: time("10:00"), reason: None };
            booking.book(patient_id, input, now()).await
        })
    });

    let results = futures::future::join_all(attempts).await;
    let succeeded = results.iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Ok(Err(AppointmentError::SlotTaken))))
        .count();

    assert_eq!(succeeded, 1);
    assert_eq!(rejected, 7);

    let booked = f
        .state
        .store
        .read(|t| t.booked_at(f.doctor_id, tomorrow(), time("10:00")))
        .await;
    assert_eq!(booked, 1);
}

#[tokio::test]
async fn completing_twice_reports_already_completed() {
    let f = fixture().await;
    let id = f.book(f.patient_id, "09:00").await.unwrap();
    let doctor = Actor::Doctor(f.doctor_id);

    f.lifecycle.complete(id, doctor, treatment("Flu"), now()).await.unwrap();
    assert_matches!(
        f.lifecycle.complete(id, doctor, treatment("Flu"), now()).await,
        Err(AppointmentError::AlreadyCompleted)
    );

    let view = Resolver::resolve(&f.state.store, id, now()).await.unwrap();
    assert_eq!(view.status, AppointmentStatus::Completed);
    assert_eq!(view.treatment.unwrap().diagnosis, "Flu");
    assert!(!view.can_cancel);
}

#[tokio::test]
async fn cancelled_and_completed_are_distinct_errors() {
    let f = fixture().await;
    let id = f.book(f.patient_id, "09:00").await.unwrap();

    f.lifecycle.cancel(id, Actor::Patient(f.patient_id), now()).await.unwrap();
    assert_matches!(
        f.lifecycle.complete(id, Actor::Doctor(f.doctor_id), treatment("Flu"), now()).await,
        Err(AppointmentError::CompletingCancelled)
    );
}

#[tokio::test]
async fn terminal_states_are_immutable() {
    let f = fixture().await;
    let completed = f.book(f.patient_id, "09:00").await.unwrap();
    let cancelled = f.book(f.patient_id, "09:30").await.unwrap();

    f.lifecycle.complete(completed, Actor::Doctor(f.doctor_id), treatment("Flu"), now()).await.unwrap();
    f.lifecycle.cancel(cancelled, Actor::Admin, now()).await.unwrap();

    assert_matches!(f.lifecycle.cancel(completed, Actor::Admin, now()).await, Err(AppointmentError::NotBooked));
    assert_matches!(f.lifecycle.cancel(cancelled, Actor::Admin, now()).await, Err(AppointmentError::NotBooked));

    let statuses = f
        .state
        .store
        .read(|t| (t.appointment(completed).unwrap().status, t.appointment(cancelled).unwrap().status))
        .await;
    assert_eq!(statuses, (AppointmentStatus::Completed, AppointmentStatus::Cancelled));
}

#[tokio::test]
async fn elapsed_appointment_cannot_be_cancelled() {
    let f = fixture().await;
    let id = f.book(f.patient_id, "09:00").await.unwrap();
    let after = tomorrow().and_time(time("09:00")) + Duration::minutes(1);

    assert_matches!(
        f.lifecycle.cancel(id, Actor::Patient(f.patient_id), after).await,
        Err(AppointmentError::AlreadyElapsed)
    );
}

#[tokio::test]
async fn cancellation_records_actor_role() {
    let f = fixture().await;
    let id = f.book(f.patient_id, "09:00").await.unwrap();

    let cancelled = f.lifecycle.cancel(id, Actor::Doctor(f.doctor_id), now()).await.unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancelled_by, Some(Role::Doctor));
    assert_eq!(cancelled.cancelled_at, Some(now()));

    // The freed time can be booked again.
    f.book(f.patient_id, "09:00").await.unwrap();
}

#[tokio::test]
async fn only_owners_may_act() {
    let f = fixture().await;
    let id = f.book(f.patient_id, "09:00").await.unwrap();
    let (_, stranger) = TestUser::patient(&f.state, "mallory").await;
    let (_, other_doctor) = TestUser::doctor(&f.state, "dr_who", "Neurology").await;

    assert_matches!(
        f.lifecycle.cancel(id, Actor::Patient(stranger), now()).await,
        Err(AppointmentError::Forbidden(_))
    );
    assert_matches!(
        f.lifecycle.complete(id, Actor::Doctor(other_doctor), treatment("Flu"), now()).await,
        Err(AppointmentError::Forbidden(_))
    );
    assert_matches!(
        f.lifecycle.complete(id, Actor::Admin, treatment("Flu"), now()).await,
        Err(AppointmentError::Forbidden(_))
    );
}

#[tokio::test]
async fn blank_diagnosis_leaves_appointment_booked() {
    let f = fixture().await;
    let id = f.book(f.patient_id, "09:00").await.unwrap();

    assert_matches!(
        f.lifecycle.complete(id, Actor::Doctor(f.doctor_id), treatment("  "), now()).await,
        Err(AppointmentError::DiagnosisRequired)
    );

    let (status, treatments) = f
        .state
        .store
        .read(|t| (t.appointment(id).unwrap().status, t.treatments().count()))
        .await;
    assert_eq!(status, AppointmentStatus::Booked);
    assert_eq!(treatments, 0);
}

#[test]
fn only_booked_has_transitions() {
    assert_eq!(LifecycleService::get_valid_transitions(AppointmentStatus::Booked).len(), 2);
    assert!(LifecycleService::get_valid_transitions(AppointmentStatus::Completed).is_empty());
    assert!(LifecycleService::get_valid_transitions(AppointmentStatus::Cancelled).is_empty());
}
