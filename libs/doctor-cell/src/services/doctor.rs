// libs/doctor-cell/src/services/doctor.rs
use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, instrument};

use appointment_cell::models::{CompleteAppointmentRequest, CompletionOutcome};
use appointment_cell::services::availability::horizon_end;
use appointment_cell::{AppointmentView, LifecycleService, Resolver};
use shared_database::{EntityStore, Tables};
use shared_models::auth::Actor;
use shared_models::entities::{Appointment, AppointmentId, AppointmentStatus, DoctorId, PatientId};
use shared_models::error::AppError;
use shared_utils::state::AppState;

use crate::models::{
    AppointmentDetail, AppointmentFilters, DoctorDashboard, DoctorInfo, DoctorStatistics, PatientHistory,
    PatientProfile, SeenPatient,
};

const PREVIOUS_VISITS_LIMIT: usize = 5;

pub struct DoctorPortalService {
    store: EntityStore,
}

impl DoctorPortalService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    fn doctor_info(tables: &Tables, doctor_id: DoctorId) -> Result<DoctorInfo, AppError> {
        let summary = Resolver::doctor_summary(tables, doctor_id)
            .ok_or_else(|| AppError::NotFound("Doctor profile not found".to_string()))?;
        Ok(DoctorInfo {
            id: summary.id,
            name: summary.name,
            email: summary.email,
            department: summary.department,
            qualification: summary.qualification,
            experience_years: summary.experience_years,
            consultation_fee: summary.consultation_fee,
        })
    }

    fn patient_profile(tables: &Tables, patient_id: PatientId, today: NaiveDate) -> Result<PatientProfile, AppError> {
        let patient = tables
            .patient(patient_id)
            .map_err(|_| AppError::NotFound("Patient not found".to_string()))?;
        let user = tables.user(patient.user_id)?;
        Ok(PatientProfile {
            id: patient.id,
            name: user.full_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            age: patient.age(today),
            blood_group: patient.blood_group.clone(),
            emergency_contact: patient.emergency_contact.clone(),
            medical_history: patient.medical_history.clone(),
            allergies: patient.allergies.clone(),
        })
    }

    fn newest_first(appointments: &mut [&Appointment]) {
        appointments.sort_by(|a, b| (b.date, b.time).cmp(&(a.date, a.time)));
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self, doctor_id: DoctorId, now: NaiveDateTime) -> Result<DoctorDashboard, AppError> {
        let today = now.date();
        let week_end = horizon_end(today);

        self.store
            .read(|t| {
                let doctor_info = Self::doctor_info(t, doctor_id)?;
                let booked = |a: &&Appointment| a.status == AppointmentStatus::Booked;

                let mut today_schedule: Vec<_> = t
                    .appointments_for_doctor(doctor_id)
                    .filter(booked)
                    .filter(|a| a.date == today)
                    .collect();
                today_schedule.sort_by_key(|a| a.time);

                let week_appointments = t
                    .appointments_for_doctor(doctor_id)
                    .filter(booked)
                    .filter(|a| a.date >= today && a.date <= week_end)
                    .count();

                let completed: Vec<_> = t
                    .appointments_for_doctor(doctor_id)
                    .filter(|a| a.status == AppointmentStatus::Completed)
                    .collect();
                let mut treated: Vec<PatientId> = completed.iter().map(|a| a.patient_id).collect();
                treated.sort_unstable();
                treated.dedup();

                Ok(DoctorDashboard {
                    doctor_info,
                    statistics: DoctorStatistics {
                        today_appointments: today_schedule.len(),
                        week_appointments,
                        total_patients_treated: treated.len(),
                        completed_appointments: completed.len(),
                    },
                    today_schedule: Resolver::views(t, today_schedule, now),
                })
            })
            .await
    }

    pub async fn appointments(
        &self,
        doctor_id: DoctorId,
        filters: AppointmentFilters,
        now: NaiveDateTime,
    ) -> Result<Vec<AppointmentView>, AppError> {
        debug!("Listing appointments for doctor {}: {:?}", doctor_id, filters);
        Ok(self
            .store
            .read(|t| {
                let mut appointments: Vec<_> = t
                    .appointments_for_doctor(doctor_id)
                    .filter(|a| filters.status.map_or(true, |s| a.status == s))
                    .filter(|a| filters.date_from.map_or(true, |d| a.date >= d))
                    .filter(|a| filters.date_to.map_or(true, |d| a.date <= d))
                    .collect();
                Self::newest_first(&mut appointments);
                Resolver::views(t, appointments, now)
            })
            .await)
    }

    /// The appointment with the patient's clinical profile and their last
    /// completed visits with this doctor.
    pub async fn appointment(
        &self,
        doctor_id: DoctorId,
        appointment_id: AppointmentId,
        now: NaiveDateTime,
    ) -> Result<AppointmentDetail, AppError> {
        self.store
            .read(|t| {
                let appointment = t
                    .appointment(appointment_id)
                    .map_err(|_| AppError::NotFound("Appointment not found".to_string()))?;
                if appointment.doctor_id != doctor_id {
                    return Err(AppError::Forbidden("You can only view your own appointments".to_string()));
                }

                let view = Resolver::view(t, appointment, now)
                    .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;
                let patient = Self::patient_profile(t, appointment.patient_id, now.date())?;
                let previous_visits = Resolver::treatment_history(t, appointment.patient_id, Some(doctor_id))
                    .into_iter()
                    .filter(|r| r.appointment_id != appointment_id)
                    .take(PREVIOUS_VISITS_LIMIT)
                    .collect();

                Ok(AppointmentDetail {
                    appointment: view,
                    patient,
                    previous_visits,
                })
            })
            .await
    }

    #[instrument(skip(self, request))]
    pub async fn complete(
        &self,
        doctor_id: DoctorId,
        appointment_id: AppointmentId,
        request: CompleteAppointmentRequest,
        now: NaiveDateTime,
    ) -> Result<CompletionOutcome, AppError> {
        let input = request.into_input()?;
        let outcome = LifecycleService::new(self.store.clone())
            .complete(appointment_id, Actor::Doctor(doctor_id), input, now)
            .await?;
        info!("Doctor {} recorded treatment {}", doctor_id, outcome.treatment_id);
        Ok(outcome)
    }

    pub async fn cancel(
        &self,
        doctor_id: DoctorId,
        appointment_id: AppointmentId,
        now: NaiveDateTime,
    ) -> Result<AppointmentView, AppError> {
        LifecycleService::new(self.store.clone())
            .cancel(appointment_id, Actor::Doctor(doctor_id), now)
            .await?;
        Ok(Resolver::resolve(&self.store, appointment_id, now).await?)
    }

    /// Patients with at least one appointment with this doctor, optionally
    /// filtered by a case-insensitive name fragment.
    pub async fn patients(
        &self,
        doctor_id: DoctorId,
        search: Option<String>,
        now: NaiveDateTime,
    ) -> Result<Vec<SeenPatient>, AppError> {
        let search = search.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());

        Ok(self
            .store
            .read(|t| {
                let mut visits: BTreeMap<PatientId, Vec<&Appointment>> = BTreeMap::new();
                for appointment in t.appointments_for_doctor(doctor_id) {
                    visits.entry(appointment.patient_id).or_default().push(appointment);
                }

                let mut patients: Vec<SeenPatient> = visits
                    .into_iter()
                    .filter_map(|(patient_id, appointments)| {
                        let patient = t.patient(patient_id).ok()?;
                        let user = t.user(patient.user_id).ok()?;
                        if let Some(fragment) = &search {
                            if !user.full_name.to_lowercase().contains(fragment) {
                                return None;
                            }
                        }
                        Some(SeenPatient {
                            id: patient_id,
                            name: user.full_name.clone(),
                            age: patient.age(now.date()),
                            blood_group: patient.blood_group.clone(),
                            phone: user.phone.clone(),
                            total_visits: appointments.len(),
                            last_visit: appointments
                                .iter()
                                .filter(|a| a.status == AppointmentStatus::Completed)
                                .map(|a| a.date)
                                .max(),
                        })
                    })
                    .collect();
                patients.sort_by(|a, b| a.name.cmp(&b.name));
                patients
            })
            .await)
    }

    pub async fn patient_history(
        &self,
        doctor_id: DoctorId,
        patient_id: PatientId,
        now: NaiveDateTime,
    ) -> Result<PatientHistory, AppError> {
        self.store
            .read(|t| {
                let patient = Self::patient_profile(t, patient_id, now.date())?;
                let mut appointments: Vec<_> = t
                    .appointments_for_patient(patient_id)
                    .filter(|a| a.doctor_id == doctor_id)
                    .collect();
                if appointments.is_empty() {
                    return Err(AppError::Forbidden(
                        "You can only view patients who have appointments with you".to_string(),
                    ));
                }
                Self::newest_first(&mut appointments);

                Ok(PatientHistory {
                    patient,
                    appointment_history: Resolver::views(t, appointments, now),
                })
            })
            .await
    }
}
