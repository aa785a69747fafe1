// libs/appointment-cell/src/services/booking.rs
use chrono::NaiveDateTime;
use tracing::{info, instrument, warn};

use shared_database::EntityStore;
use shared_models::entities::{Appointment, AppointmentStatus, PatientId};

use crate::models::{hhmm, AppointmentError, BookingInput};
use crate::services::availability::AvailabilityService;

pub struct BookingService {
    store: EntityStore,
}

impl BookingService {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// Books an appointment. The slot check and the insert share one write
    /// transaction, so concurrent requests for the same time serialize and
    /// only the first succeeds.
    #[instrument(skip(self, input), fields(doctor_id = input.doctor_id))]
    pub async fn book(
        &self,
        patient_id: PatientId,
        input: BookingInput,
        now: NaiveDateTime,
    ) -> Result<Appointment, AppointmentError> {
        let result = self
            .store
            .transaction(|t| {
                t.patient(patient_id).map_err(|_| AppointmentError::NotFound("Patient"))?;

                let duplicate = t.appointments_for_patient(patient_id).any(|a| {
                    a.doctor_id == input.doctor_id
                        && a.date == input.date
                        && a.time == input.time
                        && a.status == AppointmentStatus::Booked
                });

                AvailabilityService::check(t, input.doctor_id, input.date, input.time, now).map_err(|err| {
                    match err {
                        AppointmentError::SlotTaken if duplicate => AppointmentError::DuplicateBooking,
                        other => other,
                    }
                })?;

                let appointment = t.insert_appointment(Appointment {
                    id: 0,
                    patient_id,
                    doctor_id: input.doctor_id,
                    date: input.date,
                    time: input.time,
                    status: AppointmentStatus::Booked,
                    reason: input.reason.clone(),
                    created_at: now,
                    updated_at: now,
                    cancelled_at: None,
                    cancelled_by: None,
                })?;
                Ok(appointment)
            })
            .await;

        match &result {
            Ok(appointment) => info!(
                "Appointment {} booked for patient {} on {} at {}",
                appointment.id,
                patient_id,
                appointment.date,
                hhmm(appointment.time)
            ),
            Err(err) => warn!("Booking rejected for patient {}: {}", patient_id, err),
        }

        result
    }
}
