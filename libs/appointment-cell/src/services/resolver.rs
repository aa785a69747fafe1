// libs/appointment-cell/src/services/resolver.rs
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use shared_database::{EntityStore, Tables};
use shared_models::auth::Role;
use shared_models::entities::{
    Appointment, AppointmentId, AppointmentStatus, DepartmentId, DoctorId, PatientId, Treatment, TreatmentId, UserId,
};

use crate::models::{hhmm, AppointmentError};

#[derive(Debug, Clone, Serialize)]
pub struct PatientSummary {
    pub id: PatientId,
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub blood_group: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorSummary {
    pub id: DoctorId,
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub department_id: DepartmentId,
    pub department: String,
    pub qualification: Option<String>,
    pub experience_years: Option<i32>,
    pub consultation_fee: Option<f64>,
    pub bio: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentSummary {
    pub id: DepartmentId,
    pub name: String,
    pub description: Option<String>,
    pub doctors_count: usize,
    pub available_doctors: usize,
}

/// A treatment flattened with the visit it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct TreatmentRecord {
    pub id: TreatmentId,
    pub appointment_id: AppointmentId,
    pub doctor_id: DoctorId,
    pub doctor_name: String,
    pub department: String,
    pub date: NaiveDate,
    pub time: String,
    pub diagnosis: String,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub follow_up_required: bool,
    pub follow_up_date: Option<NaiveDate>,
}

/// An appointment joined with everything it references.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    pub id: AppointmentId,
    pub date: NaiveDate,
    pub time: String,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub cancelled_at: Option<NaiveDateTime>,
    pub cancelled_by: Option<Role>,
    pub can_cancel: bool,
    pub patient: PatientSummary,
    pub doctor: DoctorSummary,
    pub treatment: Option<Treatment>,
}

pub struct Resolver;

impl Resolver {
    pub fn patient_summary(tables: &Tables, patient_id: PatientId, today: NaiveDate) -> Option<PatientSummary> {
        let patient = tables.patient(patient_id).ok()?;
        let user = tables.user(patient.user_id).ok()?;
        Some(PatientSummary {
            id: patient.id,
            user_id: user.id,
            name: user.full_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            age: patient.age(today),
            blood_group: patient.blood_group.clone(),
        })
    }

    pub fn doctor_summary(tables: &Tables, doctor_id: DoctorId) -> Option<DoctorSummary> {
        let doctor = tables.doctor(doctor_id).ok()?;
        let user = tables.user(doctor.user_id).ok()?;
        let department = tables.department(doctor.department_id).ok()?;
        Some(DoctorSummary {
            id: doctor.id,
            user_id: user.id,
            name: user.full_name.clone(),
            email: user.email.clone(),
            department_id: department.id,
            department: department.name.clone(),
            qualification: doctor.qualification.clone(),
            experience_years: doctor.experience_years,
            consultation_fee: doctor.consultation_fee,
            bio: doctor.bio.clone(),
            is_active: user.is_active,
        })
    }

    /// Joins one appointment. `None` when a referenced record is missing.
    pub fn view(tables: &Tables, appointment: &Appointment, now: NaiveDateTime) -> Option<AppointmentView> {
        Some(AppointmentView {
            id: appointment.id,
            date: appointment.date,
            time: hhmm(appointment.time),
            status: appointment.status,
            reason: appointment.reason.clone(),
            created_at: appointment.created_at,
            updated_at: appointment.updated_at,
            cancelled_at: appointment.cancelled_at,
            cancelled_by: appointment.cancelled_by,
            can_cancel: appointment.can_be_cancelled(now),
            patient: Self::patient_summary(tables, appointment.patient_id, now.date())?,
            doctor: Self::doctor_summary(tables, appointment.doctor_id)?,
            treatment: tables.treatment_for_appointment(appointment.id).cloned(),
        })
    }

    /// Joins a list of appointments, skipping any with dangling references.
    pub fn views<'a>(
        tables: &Tables,
        appointments: impl IntoIterator<Item = &'a Appointment>,
        now: NaiveDateTime,
    ) -> Vec<AppointmentView> {
        appointments
            .into_iter()
            .filter_map(|a| Self::view(tables, a, now))
            .collect()
    }

    /// Every department with how many doctors it has and how many of them
    /// are active.
    pub fn department_summaries(tables: &Tables) -> Vec<DepartmentSummary> {
        let mut departments: Vec<DepartmentSummary> = tables
            .departments()
            .map(|department| {
                let doctors: Vec<bool> = tables
                    .doctors()
                    .filter(|d| d.department_id == department.id)
                    .map(|d| tables.user(d.user_id).map(|u| u.is_active).unwrap_or(false))
                    .collect();
                DepartmentSummary {
                    id: department.id,
                    name: department.name.clone(),
                    description: department.description.clone(),
                    doctors_count: doctors.len(),
                    available_doctors: doctors.iter().filter(|active| **active).count(),
                }
            })
            .collect();
        departments.sort_by(|a, b| a.name.cmp(&b.name));
        departments
    }

    /// Completed visits of a patient with their treatments, newest first,
    /// optionally limited to one doctor.
    pub fn treatment_history(
        tables: &Tables,
        patient_id: PatientId,
        doctor_id: Option<DoctorId>,
    ) -> Vec<TreatmentRecord> {
        let mut records: Vec<TreatmentRecord> = tables
            .appointments_for_patient(patient_id)
            .filter(|a| a.status == AppointmentStatus::Completed)
            .filter(|a| doctor_id.map_or(true, |id| a.doctor_id == id))
            .filter_map(|a| {
                let treatment = tables.treatment_for_appointment(a.id)?;
                let doctor = Self::doctor_summary(tables, a.doctor_id)?;
                Some(TreatmentRecord {
                    id: treatment.id,
                    appointment_id: a.id,
                    doctor_id: doctor.id,
                    doctor_name: doctor.name,
                    department: doctor.department,
                    date: a.date,
                    time: hhmm(a.time),
                    diagnosis: treatment.diagnosis.clone(),
                    prescription: treatment.prescription.clone(),
                    notes: treatment.notes.clone(),
                    follow_up_required: treatment.follow_up_required,
                    follow_up_date: treatment.follow_up_date,
                })
            })
            .collect();
        records.sort_by(|a, b| (b.date, &b.time).cmp(&(a.date, &a.time)));
        records
    }

    pub async fn resolve(
        store: &EntityStore,
        appointment_id: AppointmentId,
        now: NaiveDateTime,
    ) -> Result<AppointmentView, AppointmentError> {
        store
            .read(|t| {
                let appointment = t
                    .appointment(appointment_id)
                    .map_err(|_| AppointmentError::NotFound("Appointment"))?;
                Self::view(t, appointment, now).ok_or(AppointmentError::NotFound("Appointment"))
            })
            .await
    }
}
