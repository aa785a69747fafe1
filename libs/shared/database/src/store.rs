// libs/shared/database/src/store.rs
// ==============================================================================
// ENTITY STORE - IN-MEMORY RELATIONAL TABLES WITH ALL-OR-NOTHING WRITES
// ==============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use shared_models::entities::{
    Appointment, AppointmentId, AppointmentStatus, AvailabilityId, Department, DepartmentId,
    Doctor, DoctorAvailability, DoctorId, Patient, PatientId, Treatment, TreatmentId, User, UserId,
};
use shared_models::error::AppError;

use crate::snapshot::SnapshotFile;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    UniqueViolation(String),

    #[error("{0}")]
    ForeignKeyViolation(String),

    #[error("{0}")]
    Constraint(String),

    #[error("Snapshot persistence failed: {0}")]
    Persistence(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            StoreError::UniqueViolation(msg) => AppError::Conflict(msg),
            StoreError::ForeignKeyViolation(msg) | StoreError::Constraint(msg) => {
                AppError::ValidationError(msg)
            }
            StoreError::Persistence(msg) => AppError::Database(msg),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Sequences {
    user: i64,
    department: i64,
    doctor: i64,
    patient: i64,
    availability: i64,
    appointment: i64,
    treatment: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// Every table of the hospital domain. Mutating methods keep uniqueness,
/// foreign-key and cascade rules intact; a failed call leaves the tables
/// untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    users: BTreeMap<UserId, User>,
    departments: BTreeMap<DepartmentId, Department>,
    doctors: BTreeMap<DoctorId, Doctor>,
    patients: BTreeMap<PatientId, Patient>,
    availability: BTreeMap<AvailabilityId, DoctorAvailability>,
    appointments: BTreeMap<AppointmentId, Appointment>,
    treatments: BTreeMap<TreatmentId, Treatment>,
    #[serde(default)]
    sequences: Sequences,
}

impl Tables {
    // ==========================================================================
    // USERS
    // ==========================================================================

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn user(&self, id: UserId) -> StoreResult<&User> {
        self.users.get(&id).ok_or_else(|| StoreError::NotFound("User".into()))
    }

    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == username)
    }

    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.values().find(|u| u.email.eq_ignore_ascii_case(email))
    }

    fn check_user_unique(&self, user: &User) -> StoreResult<()> {
        if self.users.values().any(|u| u.id != user.id && u.username == user.username) {
            return Err(StoreError::UniqueViolation("Username already exists".into()));
        }
        if self.users.values().any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StoreError::UniqueViolation("Email already exists".into()));
        }
        Ok(())
    }

    pub fn insert_user(&mut self, mut user: User) -> StoreResult<User> {
        user.id = 0;
        self.check_user_unique(&user)?;
        user.id = next(&mut self.sequences.user);
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Applies `change` to a copy of the user and stores it if it still
    /// satisfies the uniqueness rules. The role can never change.
    pub fn update_user(&mut self, id: UserId, change: impl FnOnce(&mut User)) -> StoreResult<User> {
        let mut updated = self.user(id)?.clone();
        let role = updated.role;
        change(&mut updated);
        updated.id = id;
        if updated.role != role {
            return Err(StoreError::Constraint("User role cannot be changed".into()));
        }
        self.check_user_unique(&updated)?;
        self.users.insert(id, updated.clone());
        Ok(updated)
    }

    /// Removes the user together with its doctor or patient profile.
    pub fn delete_user(&mut self, id: UserId) -> StoreResult<()> {
        self.user(id)?;
        if let Some(doctor_id) = self.doctor_by_user(id).map(|d| d.id) {
            return self.delete_doctor(doctor_id);
        }
        if let Some(patient_id) = self.patient_by_user(id).map(|p| p.id) {
            if self.appointments.values().any(|a| a.patient_id == patient_id) {
                return Err(StoreError::ForeignKeyViolation(
                    "Cannot delete a patient with appointments".into(),
                ));
            }
            self.patients.remove(&patient_id);
        }
        self.users.remove(&id);
        Ok(())
    }

    // ==========================================================================
    // DEPARTMENTS
    // ==========================================================================

    pub fn departments(&self) -> impl Iterator<Item = &Department> {
        self.departments.values()
    }

    pub fn department(&self, id: DepartmentId) -> StoreResult<&Department> {
        self.departments
            .get(&id)
            .ok_or_else(|| StoreError::NotFound("Department".into()))
    }

    pub fn department_by_name(&self, name: &str) -> Option<&Department> {
        self.departments.values().find(|d| d.name == name)
    }

    pub fn insert_department(&mut self, mut department: Department) -> StoreResult<Department> {
        if self.department_by_name(&department.name).is_some() {
            return Err(StoreError::UniqueViolation("Department already exists".into()));
        }
        department.id = next(&mut self.sequences.department);
        self.departments.insert(department.id, department.clone());
        Ok(department)
    }

    // ==========================================================================
    // DOCTORS
    // ==========================================================================

    pub fn doctors(&self) -> impl Iterator<Item = &Doctor> {
        self.doctors.values()
    }

    pub fn doctor(&self, id: DoctorId) -> StoreResult<&Doctor> {
        self.doctors.get(&id).ok_or_else(|| StoreError::NotFound("Doctor".into()))
    }

    pub fn doctor_by_user(&self, user_id: UserId) -> Option<&Doctor> {
        self.doctors.values().find(|d| d.user_id == user_id)
    }

    fn check_doctor_refs(&self, doctor: &Doctor) -> StoreResult<()> {
        self.user(doctor.user_id)?;
        if !self.departments.contains_key(&doctor.department_id) {
            return Err(StoreError::ForeignKeyViolation("Department does not exist".into()));
        }
        Ok(())
    }

    pub fn insert_doctor(&mut self, mut doctor: Doctor) -> StoreResult<Doctor> {
        self.check_doctor_refs(&doctor)?;
        if self.doctor_by_user(doctor.user_id).is_some() || self.patient_by_user(doctor.user_id).is_some() {
            return Err(StoreError::UniqueViolation("User already has a profile".into()));
        }
        doctor.id = next(&mut self.sequences.doctor);
        self.doctors.insert(doctor.id, doctor.clone());
        Ok(doctor)
    }

    pub fn update_doctor(&mut self, id: DoctorId, change: impl FnOnce(&mut Doctor)) -> StoreResult<Doctor> {
        let mut updated = self.doctor(id)?.clone();
        let user_id = updated.user_id;
        change(&mut updated);
        updated.id = id;
        updated.user_id = user_id;
        self.check_doctor_refs(&updated)?;
        self.doctors.insert(id, updated.clone());
        Ok(updated)
    }

    /// Deletes a doctor with its slots and user. Doctors that own any
    /// appointment are kept, since appointments are never deleted.
    pub fn delete_doctor(&mut self, id: DoctorId) -> StoreResult<()> {
        let user_id = self.doctor(id)?.user_id;
        if self.appointments.values().any(|a| a.doctor_id == id) {
            return Err(StoreError::ForeignKeyViolation(
                "Cannot delete a doctor with existing appointments".into(),
            ));
        }
        self.availability.retain(|_, slot| slot.doctor_id != id);
        self.doctors.remove(&id);
        self.users.remove(&user_id);
        Ok(())
    }

    // ==========================================================================
    // PATIENTS
    // ==========================================================================

    pub fn patients(&self) -> impl Iterator<Item = &Patient> {
        self.patients.values()
    }

    pub fn patient(&self, id: PatientId) -> StoreResult<&Patient> {
        self.patients.get(&id).ok_or_else(|| StoreError::NotFound("Patient".into()))
    }

    pub fn patient_by_user(&self, user_id: UserId) -> Option<&Patient> {
        self.patients.values().find(|p| p.user_id == user_id)
    }

    pub fn insert_patient(&mut self, mut patient: Patient) -> StoreResult<Patient> {
        self.user(patient.user_id)?;
        if self.patient_by_user(patient.user_id).is_some() || self.doctor_by_user(patient.user_id).is_some() {
            return Err(StoreError::UniqueViolation("User already has a profile".into()));
        }
        patient.id = next(&mut self.sequences.patient);
        self.patients.insert(patient.id, patient.clone());
        Ok(patient)
    }

    pub fn update_patient(&mut self, id: PatientId, change: impl FnOnce(&mut Patient)) -> StoreResult<Patient> {
        let mut updated = self.patient(id)?.clone();
        let user_id = updated.user_id;
        change(&mut updated);
        updated.id = id;
        updated.user_id = user_id;
        self.patients.insert(id, updated.clone());
        Ok(updated)
    }

    // ==========================================================================
    // AVAILABILITY
    // ==========================================================================

    pub fn availability_slot(&self, id: AvailabilityId) -> StoreResult<&DoctorAvailability> {
        self.availability
            .get(&id)
            .ok_or_else(|| StoreError::NotFound("Availability slot".into()))
    }

    pub fn slots_for_doctor(&self, doctor_id: DoctorId) -> impl Iterator<Item = &DoctorAvailability> {
        self.availability.values().filter(move |s| s.doctor_id == doctor_id)
    }

    pub fn slot_starting_at(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
        start_time: NaiveTime,
    ) -> Option<&DoctorAvailability> {
        self.slots_for_doctor(doctor_id)
            .find(|s| s.date == date && s.start_time == start_time)
    }

    fn check_slot(&self, slot: &DoctorAvailability) -> StoreResult<()> {
        self.doctor(slot.doctor_id)?;
        if slot.start_time >= slot.end_time {
            return Err(StoreError::Constraint("End time must be after start time".into()));
        }
        if let Some(existing) = self.slot_starting_at(slot.doctor_id, slot.date, slot.start_time) {
            if existing.id != slot.id {
                return Err(StoreError::UniqueViolation(
                    "An availability slot already starts at this time".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn insert_availability(&mut self, mut slot: DoctorAvailability) -> StoreResult<DoctorAvailability> {
        slot.id = 0;
        self.check_slot(&slot)?;
        slot.id = next(&mut self.sequences.availability);
        self.availability.insert(slot.id, slot.clone());
        Ok(slot)
    }

    pub fn update_availability(
        &mut self,
        id: AvailabilityId,
        change: impl FnOnce(&mut DoctorAvailability),
    ) -> StoreResult<DoctorAvailability> {
        let mut updated = self.availability_slot(id)?.clone();
        let doctor_id = updated.doctor_id;
        change(&mut updated);
        updated.id = id;
        updated.doctor_id = doctor_id;
        self.check_slot(&updated)?;
        self.availability.insert(id, updated.clone());
        Ok(updated)
    }

    pub fn delete_availability(&mut self, id: AvailabilityId) -> StoreResult<DoctorAvailability> {
        self.availability
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound("Availability slot".into()))
    }

    // ==========================================================================
    // APPOINTMENTS
    // ==========================================================================

    pub fn appointments(&self) -> impl Iterator<Item = &Appointment> {
        self.appointments.values()
    }

    pub fn appointment(&self, id: AppointmentId) -> StoreResult<&Appointment> {
        self.appointments
            .get(&id)
            .ok_or_else(|| StoreError::NotFound("Appointment".into()))
    }

    pub fn appointments_for_doctor(&self, doctor_id: DoctorId) -> impl Iterator<Item = &Appointment> {
        self.appointments.values().filter(move |a| a.doctor_id == doctor_id)
    }

    pub fn appointments_for_patient(&self, patient_id: PatientId) -> impl Iterator<Item = &Appointment> {
        self.appointments.values().filter(move |a| a.patient_id == patient_id)
    }

    /// Booked appointments of a doctor at an exact date and time.
    pub fn booked_at(&self, doctor_id: DoctorId, date: NaiveDate, time: NaiveTime) -> usize {
        self.appointments_for_doctor(doctor_id)
            .filter(|a| a.status == AppointmentStatus::Booked && a.date == date && a.time == time)
            .count()
    }

    /// Booked appointments whose time falls inside the slot window.
    pub fn booked_in_slot(&self, slot: &DoctorAvailability) -> Vec<&Appointment> {
        self.appointments_for_doctor(slot.doctor_id)
            .filter(|a| a.status == AppointmentStatus::Booked && a.date == slot.date && slot.covers(a.time))
            .collect()
    }

    pub fn insert_appointment(&mut self, mut appointment: Appointment) -> StoreResult<Appointment> {
        self.patient(appointment.patient_id)?;
        self.doctor(appointment.doctor_id)?;
        if appointment.status == AppointmentStatus::Booked
            && self.booked_at(appointment.doctor_id, appointment.date, appointment.time) > 0
        {
            return Err(StoreError::UniqueViolation("Time slot already booked".into()));
        }
        appointment.id = next(&mut self.sequences.appointment);
        self.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    /// Replaces an appointment's mutable fields. Parties and schedule are fixed
    /// once booked.
    pub fn update_appointment(
        &mut self,
        id: AppointmentId,
        change: impl FnOnce(&mut Appointment),
    ) -> StoreResult<Appointment> {
        let current = self.appointment(id)?.clone();
        let mut updated = current.clone();
        change(&mut updated);
        updated.id = id;
        updated.patient_id = current.patient_id;
        updated.doctor_id = current.doctor_id;
        updated.date = current.date;
        updated.time = current.time;
        self.appointments.insert(id, updated.clone());
        Ok(updated)
    }

    /// Removes an appointment and the treatment recorded for it.
    pub fn delete_appointment(&mut self, id: AppointmentId) -> StoreResult<()> {
        self.appointment(id)?;
        self.treatments.retain(|_, t| t.appointment_id != id);
        self.appointments.remove(&id);
        Ok(())
    }

    // ==========================================================================
    // TREATMENTS
    // ==========================================================================

    pub fn treatments(&self) -> impl Iterator<Item = &Treatment> {
        self.treatments.values()
    }

    pub fn treatment_for_appointment(&self, appointment_id: AppointmentId) -> Option<&Treatment> {
        self.treatments.values().find(|t| t.appointment_id == appointment_id)
    }

    /// Creates the treatment for a completed appointment, or overwrites the
    /// existing one in place.
    pub fn upsert_treatment(&mut self, mut treatment: Treatment) -> StoreResult<Treatment> {
        let appointment = self.appointment(treatment.appointment_id)?;
        if appointment.status != AppointmentStatus::Completed {
            return Err(StoreError::Constraint(
                "Treatments can only be recorded for completed appointments".into(),
            ));
        }
        match self.treatment_for_appointment(treatment.appointment_id) {
            Some(existing) => {
                treatment.id = existing.id;
                treatment.created_at = existing.created_at;
            }
            None => treatment.id = next(&mut self.sequences.treatment),
        }
        self.treatments.insert(treatment.id, treatment.clone());
        Ok(treatment)
    }

    pub fn counts(&self) -> TableCounts {
        TableCounts {
            users: self.users.len(),
            departments: self.departments.len(),
            doctors: self.doctors.len(),
            patients: self.patients.len(),
            availability: self.availability.len(),
            appointments: self.appointments.len(),
            treatments: self.treatments.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub users: usize,
    pub departments: usize,
    pub doctors: usize,
    pub patients: usize,
    pub availability: usize,
    pub appointments: usize,
    pub treatments: usize,
}

// ==============================================================================
// SHARED HANDLE
// ==============================================================================

#[derive(Clone)]
pub struct EntityStore {
    inner: Arc<RwLock<Tables>>,
    snapshot: Option<Arc<SnapshotFile>>,
}

impl EntityStore {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Tables::default())),
            snapshot: None,
        }
    }

    /// Opens a store backed by a JSON snapshot, loading it when it exists.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let snapshot = SnapshotFile::new(path);
        let tables = match snapshot.load().await? {
            Some(tables) => {
                info!("Loaded entity snapshot from {:?}: {:?}", snapshot.path(), tables.counts());
                tables
            }
            None => {
                warn!("No entity snapshot at {:?}, starting empty", snapshot.path());
                Tables::default()
            }
        };

        Ok(Self {
            inner: Arc::new(RwLock::new(tables)),
            snapshot: Some(Arc::new(snapshot)),
        })
    }

    pub async fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        let guard = self.inner.read().await;
        f(&guard)
    }

    /// Owned copy of every table, for readers that must not hold the lock.
    pub async fn snapshot(&self) -> Tables {
        self.inner.read().await.clone()
    }

    /// Runs `f` against a draft of the tables under the write lock. The draft
    /// replaces the live tables only when `f` succeeds and, for persistent
    /// stores, the snapshot has been written.
    pub async fn transaction<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Tables) -> Result<R, E>,
        E: From<StoreError>,
    {
        let mut guard = self.inner.write().await;
        let mut draft = guard.clone();

        let result = match f(&mut draft) {
            Ok(result) => result,
            Err(err) => {
                debug!("Transaction rolled back");
                return Err(err);
            }
        };

        if let Some(snapshot) = &self.snapshot {
            snapshot.write(&draft).await?;
        }

        *guard = draft;
        Ok(result)
    }
}
