// libs/patient-cell/src/services/patient.rs
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, info, instrument};

use appointment_cell::models::{BookAppointmentRequest, SlotOccupancy};
use appointment_cell::{
    AppointmentView, AvailabilityService, BookingService, DepartmentSummary, DoctorSummary, LifecycleService,
    Resolver, TreatmentRecord,
};
use notification_cell::{ExportResult, ExportService};
use shared_database::{
    cache_json, EntityStore, KeyValueStore, Tables, DEPARTMENTS_CACHE_KEY, DEPARTMENTS_CACHE_TTL_SECONDS,
};
use shared_models::auth::Actor;
use shared_models::entities::{AppointmentId, AppointmentStatus, DoctorId, PatientId};
use shared_models::error::AppError;
use shared_utils::state::AppState;

use crate::models::{AppointmentFilter, DoctorSearchQuery, PatientDashboard, PatientInfo};

const RECENT_HISTORY_LIMIT: usize = 5;

pub struct PatientPortalService {
    store: EntityStore,
    cache: Arc<dyn KeyValueStore>,
    export_dir: PathBuf,
}

impl PatientPortalService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            cache: state.cache.clone(),
            export_dir: state.config.export_dir.clone(),
        }
    }

    fn patient_info(tables: &Tables, patient_id: PatientId, now: NaiveDateTime) -> Result<PatientInfo, AppError> {
        let patient = tables
            .patient(patient_id)
            .map_err(|_| AppError::NotFound("Patient profile not found".to_string()))?;
        let user = tables.user(patient.user_id)?;
        Ok(PatientInfo {
            id: patient.id,
            name: user.full_name.clone(),
            email: user.email.clone(),
            blood_group: patient.blood_group.clone(),
            age: patient.age(now.date()),
            date_of_birth: patient.date_of_birth,
        })
    }

    fn filtered(
        tables: &Tables,
        patient_id: PatientId,
        filter: AppointmentFilter,
        now: NaiveDateTime,
    ) -> Vec<AppointmentView> {
        let today = now.date();
        let mut appointments: Vec<_> = tables
            .appointments_for_patient(patient_id)
            .filter(|a| match filter {
                AppointmentFilter::Upcoming => a.status == AppointmentStatus::Booked && a.date >= today,
                AppointmentFilter::Past => a.date < today || a.status.is_terminal(),
                AppointmentFilter::All => true,
            })
            .collect();

        match filter {
            AppointmentFilter::Upcoming => appointments.sort_by_key(|a| (a.date, a.time)),
            _ => appointments.sort_by(|a, b| (b.date, b.time).cmp(&(a.date, a.time))),
        }
        Resolver::views(tables, appointments, now)
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self, patient_id: PatientId, now: NaiveDateTime) -> Result<PatientDashboard, AppError> {
        self.store
            .read(|t| {
                let patient_info = Self::patient_info(t, patient_id, now)?;
                let mut recent_history = Self::filtered(t, patient_id, AppointmentFilter::Past, now);
                recent_history.truncate(RECENT_HISTORY_LIMIT);

                Ok(PatientDashboard {
                    patient_info,
                    upcoming_appointments: Self::filtered(t, patient_id, AppointmentFilter::Upcoming, now),
                    recent_history,
                    departments: Resolver::department_summaries(t),
                })
            })
            .await
    }

    /// Active doctors, optionally narrowed by department and a
    /// case-insensitive name fragment.
    pub async fn search_doctors(&self, query: DoctorSearchQuery) -> Result<Vec<DoctorSummary>, AppError> {
        let name = query
            .name
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty());
        debug!("Searching doctors: department={:?} name={:?}", query.department_id, name);

        Ok(self
            .store
            .read(|t| {
                let mut doctors: Vec<DoctorSummary> = t
                    .doctors()
                    .filter(|d| query.department_id.map_or(true, |id| d.department_id == id))
                    .filter_map(|d| Resolver::doctor_summary(t, d.id))
                    .filter(|d| d.is_active)
                    .filter(|d| name.as_ref().map_or(true, |n| d.name.to_lowercase().contains(n)))
                    .collect();
                doctors.sort_by(|a, b| a.name.cmp(&b.name));
                doctors
            })
            .await)
    }

    pub async fn doctor_availability(
        &self,
        doctor_id: DoctorId,
        now: NaiveDateTime,
    ) -> Result<(DoctorSummary, Vec<SlotOccupancy>), AppError> {
        let doctor = self
            .store
            .read(|t| Resolver::doctor_summary(t, doctor_id))
            .await
            .filter(|d| d.is_active)
            .ok_or_else(|| AppError::NotFound("Doctor not found or inactive".to_string()))?;

        let slots = AvailabilityService::new(self.store.clone())
            .slot_report(doctor_id, now.date(), true)
            .await?;
        Ok((doctor, slots))
    }

    #[instrument(skip(self, request))]
    pub async fn book(
        &self,
        patient_id: PatientId,
        request: BookAppointmentRequest,
        now: NaiveDateTime,
    ) -> Result<AppointmentView, AppError> {
        let input = request.into_input()?;
        let appointment = BookingService::new(self.store.clone())
            .book(patient_id, input, now)
            .await?;

        info!("Patient {} booked appointment {}", patient_id, appointment.id);
        Ok(Resolver::resolve(&self.store, appointment.id, now).await?)
    }

    pub async fn appointments(
        &self,
        patient_id: PatientId,
        filter: AppointmentFilter,
        now: NaiveDateTime,
    ) -> Result<Vec<AppointmentView>, AppError> {
        Ok(self
            .store
            .read(|t| Self::filtered(t, patient_id, filter, now))
            .await)
    }

    pub async fn appointment(
        &self,
        patient_id: PatientId,
        appointment_id: AppointmentId,
        now: NaiveDateTime,
    ) -> Result<AppointmentView, AppError> {
        let view = Resolver::resolve(&self.store, appointment_id, now).await?;
        if view.patient.id != patient_id {
            return Err(AppError::Forbidden("You can only view your own appointments".to_string()));
        }
        Ok(view)
    }

    pub async fn cancel(
        &self,
        patient_id: PatientId,
        appointment_id: AppointmentId,
        now: NaiveDateTime,
    ) -> Result<AppointmentView, AppError> {
        LifecycleService::new(self.store.clone())
            .cancel(appointment_id, Actor::Patient(patient_id), now)
            .await?;
        Ok(Resolver::resolve(&self.store, appointment_id, now).await?)
    }

    pub async fn treatment_history(&self, patient_id: PatientId) -> Result<Vec<TreatmentRecord>, AppError> {
        Ok(self
            .store
            .read(|t| Resolver::treatment_history(t, patient_id, None))
            .await)
    }

    pub async fn export_treatment_history(
        &self,
        patient_id: PatientId,
        now: NaiveDateTime,
    ) -> Result<ExportResult, AppError> {
        Ok(ExportService::new(self.store.clone(), self.export_dir.clone())
            .export_treatment_history(patient_id, now)
            .await?)
    }

    pub async fn departments(&self) -> Result<Vec<DepartmentSummary>, AppError> {
        let store = self.store.clone();
        cache_json(
            self.cache.as_ref(),
            DEPARTMENTS_CACHE_KEY,
            DEPARTMENTS_CACHE_TTL_SECONDS,
            || async move { Ok(store.read(Resolver::department_summaries).await) },
        )
        .await
    }
}
