// libs/appointment-cell/src/services/lifecycle.rs
use chrono::NaiveDateTime;
use tracing::{debug, info, instrument, warn};

use shared_database::{EntityStore, Tables};
use shared_models::auth::Actor;
use shared_models::entities::{Appointment, AppointmentId, AppointmentStatus, Treatment};

use crate::models::{AppointmentError, CompletionOutcome, TreatmentInput};

pub struct LifecycleService {
    store: EntityStore,
}

impl LifecycleService {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Booked => vec![AppointmentStatus::Completed, AppointmentStatus::Cancelled],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
        }
    }

    fn ensure_owner(appointment: &Appointment, actor: Actor) -> Result<(), AppointmentError> {
        let allowed = match actor {
            Actor::Admin => true,
            Actor::Doctor(doctor_id) => appointment.doctor_id == doctor_id,
            Actor::Patient(patient_id) => appointment.patient_id == patient_id,
        };
        if allowed {
            Ok(())
        } else {
            warn!("{:?} tried to act on appointment {}", actor, appointment.id);
            Err(AppointmentError::Forbidden("You do not have access to this appointment"))
        }
    }

    fn load(tables: &Tables, appointment_id: AppointmentId) -> Result<Appointment, AppointmentError> {
        tables
            .appointment(appointment_id)
            .cloned()
            .map_err(|_| AppointmentError::NotFound("Appointment"))
    }

    /// Marks a booked appointment completed and records its treatment. Only
    /// the doctor the appointment belongs to may complete it.
    #[instrument(skip(self, input))]
    pub async fn complete(
        &self,
        appointment_id: AppointmentId,
        actor: Actor,
        input: TreatmentInput,
        now: NaiveDateTime,
    ) -> Result<CompletionOutcome, AppointmentError> {
        let outcome = self
            .store
            .transaction(|t| {
                let appointment = Self::load(t, appointment_id)?;
                match actor {
                    Actor::Doctor(_) => Self::ensure_owner(&appointment, actor)?,
                    _ => return Err(AppointmentError::Forbidden("Only the assigned doctor can complete an appointment")),
                }

                match appointment.status {
                    AppointmentStatus::Completed => return Err(AppointmentError::AlreadyCompleted),
                    AppointmentStatus::Cancelled => return Err(AppointmentError::CompletingCancelled),
                    AppointmentStatus::Booked => {}
                }
                if input.diagnosis.trim().is_empty() {
                    return Err(AppointmentError::DiagnosisRequired);
                }

                debug!(
                    "Transition {} -> {} for appointment {}",
                    appointment.status,
                    AppointmentStatus::Completed,
                    appointment_id
                );
                t.update_appointment(appointment_id, |a| {
                    a.status = AppointmentStatus::Completed;
                    a.updated_at = now;
                })?;

                let treatment = t.upsert_treatment(Treatment {
                    id: 0,
                    appointment_id,
                    diagnosis: input.diagnosis.trim().to_string(),
                    prescription: input.prescription.clone(),
                    notes: input.notes.clone(),
                    follow_up_required: input.follow_up_required || input.follow_up_date.is_some(),
                    follow_up_date: input.follow_up_date,
                    created_at: now,
                    updated_at: now,
                })?;

                Ok(CompletionOutcome {
                    appointment_id,
                    treatment_id: treatment.id,
                })
            })
            .await?;

        info!("Appointment {} completed", appointment_id);
        Ok(outcome)
    }

    /// Cancels a booked appointment whose time has not passed. Allowed for
    /// the owning doctor, the owning patient and any admin.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        appointment_id: AppointmentId,
        actor: Actor,
        now: NaiveDateTime,
    ) -> Result<Appointment, AppointmentError> {
        let cancelled = self
            .store
            .transaction(|t| {
                let appointment = Self::load(t, appointment_id)?;
                Self::ensure_owner(&appointment, actor)?;

                if !Self::get_valid_transitions(appointment.status).contains(&AppointmentStatus::Cancelled) {
                    return Err(AppointmentError::NotBooked);
                }
                if !appointment.can_be_cancelled(now) {
                    return Err(AppointmentError::AlreadyElapsed);
                }

                let updated = t.update_appointment(appointment_id, |a| {
                    a.status = AppointmentStatus::Cancelled;
                    a.cancelled_at = Some(now);
                    a.cancelled_by = Some(actor.role());
                    a.updated_at = now;
                })?;
                Ok(updated)
            })
            .await?;

        info!("Appointment {} cancelled by {}", appointment_id, actor.role());
        Ok(cancelled)
    }
}
