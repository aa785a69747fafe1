use chrono::NaiveDate;
use serde_json::{json, Value};

use shared_database::Tables;
use shared_models::auth::{Actor, Role};
use shared_models::entities::User;
use shared_models::error::AppError;

/// Resolves the actor a user acts as. Non-admin users must have a profile.
pub fn actor_for(tables: &Tables, user: &User) -> Result<Actor, AppError> {
    match user.role {
        Role::Admin => Ok(Actor::Admin),
        Role::Doctor => tables
            .doctor_by_user(user.id)
            .map(|d| Actor::Doctor(d.id))
            .ok_or_else(|| AppError::Internal(format!("Doctor user {} has no profile", user.id))),
        Role::Patient => tables
            .patient_by_user(user.id)
            .map(|p| Actor::Patient(p.id))
            .ok_or_else(|| AppError::Internal(format!("Patient user {} has no profile", user.id))),
    }
}

/// Role-specific profile block of a user.
pub fn role_profile(tables: &Tables, user: &User, today: NaiveDate) -> Value {
    match user.role {
        Role::Admin => json!({}),
        Role::Doctor => match tables.doctor_by_user(user.id) {
            Some(doctor) => json!({
                "doctor_id": doctor.id,
                "department_id": doctor.department_id,
                "department": tables.department(doctor.department_id).map(|d| d.name.clone()).ok(),
                "qualification": doctor.qualification,
                "experience_years": doctor.experience_years,
                "consultation_fee": doctor.consultation_fee,
                "bio": doctor.bio,
            }),
            None => json!({}),
        },
        Role::Patient => match tables.patient_by_user(user.id) {
            Some(patient) => json!({
                "patient_id": patient.id,
                "date_of_birth": patient.date_of_birth,
                "age": patient.age(today),
                "blood_group": patient.blood_group,
                "emergency_contact": patient.emergency_contact,
                "medical_history": patient.medical_history,
                "allergies": patient.allergies,
            }),
            None => json!({}),
        },
    }
}

pub fn user_json(tables: &Tables, user: &User, today: NaiveDate) -> Value {
    json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
        "full_name": user.full_name,
        "role": user.role,
        "phone": user.phone,
        "address": user.address,
        "is_active": user.is_active,
        "registered_at": user.registered_at,
        "profile": role_profile(tables, user, today),
    })
}
