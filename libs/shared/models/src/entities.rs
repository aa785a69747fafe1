// ==============================================================================
// PERSISTED ENTITIES
// ==============================================================================

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::auth::Role;

pub type UserId = i64;
pub type DepartmentId = i64;
pub type DoctorId = i64;
pub type PatientId = i64;
pub type AvailabilityId = i64;
pub type AppointmentId = i64;
pub type TreatmentId = i64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub full_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub registered_at: NaiveDateTime,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: DoctorId,
    pub user_id: UserId,
    pub department_id: DepartmentId,
    pub qualification: Option<String>,
    pub experience_years: Option<i32>,
    pub consultation_fee: Option<f64>,
    pub bio: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub user_id: UserId,
    pub date_of_birth: Option<NaiveDate>,
    pub blood_group: Option<String>,
    pub emergency_contact: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Patient {
    /// Age in whole years on `today`, if the date of birth is known.
    pub fn age(&self, today: NaiveDate) -> Option<i32> {
        self.date_of_birth.map(|dob| {
            let had_birthday = (today.month(), today.day()) >= (dob.month(), dob.day());
            today.year() - dob.year() - if had_birthday { 0 } else { 1 }
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorAvailability {
    pub id: AvailabilityId,
    pub doctor_id: DoctorId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub max_appointments: u32,
    pub created_at: NaiveDateTime,
}

impl DoctorAvailability {
    /// Half-open window check: `start_time <= time < end_time`.
    pub fn covers(&self, time: NaiveTime) -> bool {
        self.start_time <= time && time < self.end_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Booked,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppointmentStatus::Booked)
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        matches!(
            (self, next),
            (AppointmentStatus::Booked, AppointmentStatus::Completed)
                | (AppointmentStatus::Booked, AppointmentStatus::Cancelled)
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Booked => write!(f, "Booked"),
            AppointmentStatus::Completed => write!(f, "Completed"),
            AppointmentStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub patient_id: PatientId,
    pub doctor_id: DoctorId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub cancelled_at: Option<NaiveDateTime>,
    pub cancelled_by: Option<Role>,
}

impl Appointment {
    pub fn scheduled_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn is_upcoming(&self, now: NaiveDateTime) -> bool {
        self.status == AppointmentStatus::Booked && self.scheduled_at() > now
    }

    /// Only a booked appointment whose time has not yet elapsed may be cancelled.
    pub fn can_be_cancelled(&self, now: NaiveDateTime) -> bool {
        self.is_upcoming(now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Treatment {
    pub id: TreatmentId,
    pub appointment_id: AppointmentId,
    pub diagnosis: String,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub follow_up_required: bool,
    pub follow_up_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
