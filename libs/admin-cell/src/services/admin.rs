// libs/admin-cell/src/services/admin.rs
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, info, instrument, warn};

use appointment_cell::{AppointmentView, DepartmentSummary, LifecycleService, Resolver};
use shared_database::{EntityStore, KeyValueStore, Tables, DEPARTMENTS_CACHE_KEY};
use shared_models::auth::{Actor, Role};
use shared_models::entities::{AppointmentId, AppointmentStatus, Doctor, DoctorId, Patient, PatientId, User};
use shared_models::error::AppError;
use shared_utils::password::PasswordService;
use shared_utils::state::AppState;
use shared_utils::validation::{non_blank, required, validate_email};

use crate::models::{
    AccountStatus, AddDoctorRequest, AdminDashboard, AdminStatistics, AppointmentFilters, DoctorDetail, DoctorHit,
    DoctorListQuery, DoctorListing, PatientDetail, PatientHit, PatientListQuery, PatientListing, PatientRecord,
    SearchResults, SearchScope, UpdateDoctorRequest,
};

const RECENT_APPOINTMENTS_LIMIT: usize = 10;
const SEARCH_RESULTS_LIMIT: usize = 10;

pub struct AdminService {
    store: EntityStore,
    cache: Arc<dyn KeyValueStore>,
}

fn matches_fragment(value: Option<&str>, fragment: &str) -> bool {
    value.is_some_and(|v| v.to_lowercase().contains(fragment))
}

fn search_fragment(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty())
}

impl AdminService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            cache: state.cache.clone(),
        }
    }

    /// Doctor changes alter department counts.
    async fn invalidate_departments(&self) {
        if let Err(e) = self.cache.delete(DEPARTMENTS_CACHE_KEY).await {
            warn!("Failed to drop cached departments: {}", e);
        }
    }

    fn user_of_doctor<'a>(tables: &'a Tables, doctor: &Doctor) -> Result<&'a User, AppError> {
        Ok(tables.user(doctor.user_id)?)
    }

    fn patient_matches(user: &User, fragment: &str) -> bool {
        matches_fragment(Some(&user.full_name), fragment)
            || matches_fragment(Some(&user.email), fragment)
            || matches_fragment(user.phone.as_deref(), fragment)
    }

    // ==========================================================================
    // DASHBOARD
    // ==========================================================================

    #[instrument(skip(self))]
    pub async fn dashboard(&self, now: NaiveDateTime) -> Result<AdminDashboard, AppError> {
        let today = now.date();
        Ok(self
            .store
            .read(|t| {
                let active = |user_id| t.user(user_id).map(|u| u.is_active).unwrap_or(false);
                let statistics = AdminStatistics {
                    total_doctors: t.doctors().filter(|d| active(d.user_id)).count(),
                    total_patients: t.patients().filter(|p| active(p.user_id)).count(),
                    total_appointments: t.appointments().count(),
                    upcoming_appointments: t
                        .appointments()
                        .filter(|a| a.status == AppointmentStatus::Booked && a.date >= today)
                        .count(),
                    completed_appointments: t
                        .appointments()
                        .filter(|a| a.status == AppointmentStatus::Completed)
                        .count(),
                };

                let mut recent: Vec<_> = t.appointments().collect();
                recent.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
                recent.truncate(RECENT_APPOINTMENTS_LIMIT);

                AdminDashboard {
                    statistics,
                    recent_appointments: Resolver::views(t, recent, now),
                }
            })
            .await)
    }

    // ==========================================================================
    // DOCTORS
    // ==========================================================================

    pub async fn doctors(&self, query: DoctorListQuery, now: NaiveDateTime) -> Result<Vec<DoctorListing>, AppError> {
        let status = AccountStatus::parse(query.status.as_deref())?;
        let search = search_fragment(query.search);

        self.store
            .read(|t| {
                let mut listings = Vec::new();
                for doctor in t.doctors() {
                    if query.department_id.is_some_and(|id| doctor.department_id != id) {
                        continue;
                    }
                    let user = Self::user_of_doctor(t, doctor)?;
                    if !status.admits(user.is_active) {
                        continue;
                    }
                    if let Some(fragment) = &search {
                        if !matches_fragment(Some(&user.full_name), fragment) {
                            continue;
                        }
                    }
                    let Some(summary) = Resolver::doctor_summary(t, doctor.id) else {
                        continue;
                    };
                    listings.push(DoctorListing {
                        doctor: summary,
                        phone: user.phone.clone(),
                        upcoming_appointments: t.appointments_for_doctor(doctor.id).filter(|a| a.is_upcoming(now)).count(),
                        completed_appointments: t
                            .appointments_for_doctor(doctor.id)
                            .filter(|a| a.status == AppointmentStatus::Completed)
                            .count(),
                    });
                }
                listings.sort_by(|a, b| a.doctor.name.cmp(&b.doctor.name));
                Ok(listings)
            })
            .await
    }

    pub async fn doctor(&self, doctor_id: DoctorId) -> Result<DoctorDetail, AppError> {
        self.store
            .read(|t| {
                let doctor = t
                    .doctor(doctor_id)
                    .map_err(|_| AppError::NotFound("Doctor not found".to_string()))?;
                let user = Self::user_of_doctor(t, doctor)?;
                let summary = Resolver::doctor_summary(t, doctor_id)
                    .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))?;
                Ok(DoctorDetail {
                    doctor: summary,
                    phone: user.phone.clone(),
                    address: user.address.clone(),
                    registration_date: doctor.created_at,
                })
            })
            .await
    }

    #[instrument(skip(self, request))]
    pub async fn add_doctor(&self, request: AddDoctorRequest, now: NaiveDateTime) -> Result<DoctorDetail, AppError> {
        let missing = || AppError::ValidationError("Missing required fields".to_string());
        let username = required("username", request.username.as_deref()).map_err(|_| missing())?;
        let email = required("email", request.email.as_deref()).map_err(|_| missing())?;
        let password = required("password", request.password.as_deref()).map_err(|_| missing())?;
        let full_name = required("full_name", request.full_name.as_deref()).map_err(|_| missing())?;
        let phone = required("phone", request.phone.as_deref()).map_err(|_| missing())?;
        let department_id = request.department_id.ok_or_else(missing)?;

        validate_email(&email)?;
        PasswordService::validate_new_password(&password)?;
        let password_hash = PasswordService::hash_password(&password)?;

        let doctor = self
            .store
            .transaction(|t| {
                t.department(department_id)
                    .map_err(|_| AppError::NotFound("Department not found".to_string()))?;
                let user = t.insert_user(User {
                    id: 0,
                    username,
                    email,
                    password_hash,
                    role: Role::Doctor,
                    full_name,
                    phone: Some(phone),
                    address: non_blank(request.address),
                    registered_at: now,
                    is_active: true,
                })?;
                let doctor = t.insert_doctor(Doctor {
                    id: 0,
                    user_id: user.id,
                    department_id,
                    qualification: non_blank(request.qualification),
                    experience_years: request.experience_years,
                    consultation_fee: request.consultation_fee,
                    bio: non_blank(request.bio),
                    created_at: now,
                })?;
                Ok::<_, AppError>(doctor)
            })
            .await?;

        info!("Added doctor {} (user {})", doctor.id, doctor.user_id);
        self.invalidate_departments().await;
        self.doctor(doctor.id).await
    }

    #[instrument(skip(self, request))]
    pub async fn update_doctor(&self, doctor_id: DoctorId, request: UpdateDoctorRequest) -> Result<DoctorDetail, AppError> {
        let email = non_blank(request.email);
        if let Some(email) = &email {
            validate_email(email)?;
        }

        self.store
            .transaction(|t| {
                let doctor = t
                    .doctor(doctor_id)
                    .map_err(|_| AppError::NotFound("Doctor not found".to_string()))?
                    .clone();
                if let Some(email) = &email {
                    if t.user_by_email(email).is_some_and(|other| other.id != doctor.user_id) {
                        return Err(AppError::Conflict("Email already in use".to_string()));
                    }
                }
                if let Some(department_id) = request.department_id {
                    t.department(department_id)
                        .map_err(|_| AppError::NotFound("Department not found".to_string()))?;
                }

                t.update_user(doctor.user_id, |u| {
                    if let Some(full_name) = non_blank(request.full_name.clone()) {
                        u.full_name = full_name;
                    }
                    if let Some(email) = email.clone() {
                        u.email = email;
                    }
                    if let Some(phone) = non_blank(request.phone.clone()) {
                        u.phone = Some(phone);
                    }
                    if request.address.is_some() {
                        u.address = non_blank(request.address.clone());
                    }
                })?;
                t.update_doctor(doctor_id, |d| {
                    if let Some(department_id) = request.department_id {
                        d.department_id = department_id;
                    }
                    if request.qualification.is_some() {
                        d.qualification = non_blank(request.qualification.clone());
                    }
                    if request.experience_years.is_some() {
                        d.experience_years = request.experience_years;
                    }
                    if request.consultation_fee.is_some() {
                        d.consultation_fee = request.consultation_fee;
                    }
                    if request.bio.is_some() {
                        d.bio = non_blank(request.bio.clone());
                    }
                })?;
                Ok(())
            })
            .await?;

        debug!("Updated doctor {}", doctor_id);
        self.invalidate_departments().await;
        self.doctor(doctor_id).await
    }

    /// Flips the doctor's account between active and inactive and returns
    /// the new state.
    #[instrument(skip(self))]
    pub async fn toggle_doctor(&self, doctor_id: DoctorId) -> Result<bool, AppError> {
        let is_active = self
            .store
            .transaction(|t| {
                let user_id = t
                    .doctor(doctor_id)
                    .map_err(|_| AppError::NotFound("Doctor not found".to_string()))?
                    .user_id;
                let user = t.update_user(user_id, |u| u.is_active = !u.is_active)?;
                Ok::<_, AppError>(user.is_active)
            })
            .await?;

        info!("Doctor {} is now {}", doctor_id, if is_active { "active" } else { "inactive" });
        self.invalidate_departments().await;
        Ok(is_active)
    }

    #[instrument(skip(self))]
    pub async fn delete_doctor(&self, doctor_id: DoctorId) -> Result<(), AppError> {
        self.store
            .transaction(|t| {
                t.doctor(doctor_id)
                    .map_err(|_| AppError::NotFound("Doctor not found".to_string()))?;
                t.delete_doctor(doctor_id)?;
                Ok::<_, AppError>(())
            })
            .await?;

        info!("Deleted doctor {}", doctor_id);
        self.invalidate_departments().await;
        Ok(())
    }

    // ==========================================================================
    // PATIENTS
    // ==========================================================================

    fn patient_listing(patient: &Patient, user: &User, now: NaiveDateTime) -> PatientListing {
        PatientListing {
            id: patient.id,
            user_id: user.id,
            name: user.full_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            age: patient.age(now.date()),
            blood_group: patient.blood_group.clone(),
            is_active: user.is_active,
            registration_date: patient.created_at,
        }
    }

    pub async fn patients(&self, query: PatientListQuery, now: NaiveDateTime) -> Result<Vec<PatientListing>, AppError> {
        let status = AccountStatus::parse(query.status.as_deref())?;
        let search = search_fragment(query.search);

        self.store
            .read(|t| {
                let mut listings = Vec::new();
                for patient in t.patients() {
                    let user = t.user(patient.user_id)?;
                    if !status.admits(user.is_active) {
                        continue;
                    }
                    if search.as_deref().is_some_and(|fragment| !Self::patient_matches(user, fragment)) {
                        continue;
                    }
                    listings.push(Self::patient_listing(patient, user, now));
                }
                listings.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(listings)
            })
            .await
    }

    pub async fn patient(&self, patient_id: PatientId, now: NaiveDateTime) -> Result<PatientDetail, AppError> {
        self.store
            .read(|t| {
                let patient = t
                    .patient(patient_id)
                    .map_err(|_| AppError::NotFound("Patient not found".to_string()))?;
                let user = t.user(patient.user_id)?;

                let mut appointments: Vec<_> = t.appointments_for_patient(patient_id).collect();
                appointments.sort_by(|a, b| (b.date, b.time).cmp(&(a.date, a.time)));
                appointments.truncate(RECENT_APPOINTMENTS_LIMIT);

                Ok(PatientDetail {
                    patient: PatientRecord {
                        id: patient.id,
                        user_id: user.id,
                        name: user.full_name.clone(),
                        email: user.email.clone(),
                        phone: user.phone.clone(),
                        address: user.address.clone(),
                        date_of_birth: patient.date_of_birth,
                        age: patient.age(now.date()),
                        blood_group: patient.blood_group.clone(),
                        emergency_contact: patient.emergency_contact.clone(),
                        medical_history: patient.medical_history.clone(),
                        allergies: patient.allergies.clone(),
                        is_active: user.is_active,
                        registration_date: patient.created_at,
                    },
                    recent_appointments: Resolver::views(t, appointments, now),
                })
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn toggle_patient(&self, patient_id: PatientId) -> Result<bool, AppError> {
        let is_active = self
            .store
            .transaction(|t| {
                let user_id = t
                    .patient(patient_id)
                    .map_err(|_| AppError::NotFound("Patient not found".to_string()))?
                    .user_id;
                let user = t.update_user(user_id, |u| u.is_active = !u.is_active)?;
                Ok::<_, AppError>(user.is_active)
            })
            .await?;

        info!("Patient {} is now {}", patient_id, if is_active { "active" } else { "inactive" });
        Ok(is_active)
    }

    // ==========================================================================
    // APPOINTMENTS & DEPARTMENTS
    // ==========================================================================

    pub async fn appointments(
        &self,
        filters: AppointmentFilters,
        now: NaiveDateTime,
    ) -> Result<Vec<AppointmentView>, AppError> {
        debug!("Listing appointments: {:?}", filters);
        Ok(self
            .store
            .read(|t| {
                let mut appointments: Vec<_> = t
                    .appointments()
                    .filter(|a| filters.status.map_or(true, |s| a.status == s))
                    .filter(|a| filters.date_from.map_or(true, |d| a.date >= d))
                    .filter(|a| filters.date_to.map_or(true, |d| a.date <= d))
                    .filter(|a| filters.doctor_id.map_or(true, |id| a.doctor_id == id))
                    .filter(|a| filters.patient_id.map_or(true, |id| a.patient_id == id))
                    .collect();
                appointments.sort_by(|a, b| (b.date, b.time).cmp(&(a.date, a.time)));
                Resolver::views(t, appointments, now)
            })
            .await)
    }

    pub async fn cancel_appointment(
        &self,
        appointment_id: AppointmentId,
        now: NaiveDateTime,
    ) -> Result<AppointmentView, AppError> {
        LifecycleService::new(self.store.clone())
            .cancel(appointment_id, Actor::Admin, now)
            .await?;
        Ok(Resolver::resolve(&self.store, appointment_id, now).await?)
    }

    pub async fn departments(&self) -> Vec<DepartmentSummary> {
        self.store.read(Resolver::department_summaries).await
    }

    // ==========================================================================
    // SEARCH
    // ==========================================================================

    pub async fn search(&self, q: Option<String>, scope: SearchScope) -> Result<SearchResults, AppError> {
        let fragment =
            search_fragment(q).ok_or_else(|| AppError::BadRequest("Search query is required".to_string()))?;

        Ok(self
            .store
            .read(|t| {
                let mut results = SearchResults::default();

                if scope.includes_doctors() {
                    results.doctors = Some(
                        t.doctors()
                            .filter_map(|d| Resolver::doctor_summary(t, d.id))
                            .filter(|d| matches_fragment(Some(&d.name), &fragment))
                            .take(SEARCH_RESULTS_LIMIT)
                            .map(|d| DoctorHit {
                                id: d.id,
                                name: d.name,
                                department: d.department,
                                is_active: d.is_active,
                            })
                            .collect(),
                    );
                }

                if scope.includes_patients() {
                    results.patients = Some(
                        t.patients()
                            .filter_map(|p| t.user(p.user_id).ok().map(|u| (p, u)))
                            .filter(|(_, u)| Self::patient_matches(u, &fragment))
                            .take(SEARCH_RESULTS_LIMIT)
                            .map(|(p, u)| PatientHit {
                                id: p.id,
                                name: u.full_name.clone(),
                                email: u.email.clone(),
                                phone: u.phone.clone(),
                            })
                            .collect(),
                    );
                }

                results
            })
            .await)
    }
}
