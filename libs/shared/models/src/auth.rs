use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{DoctorId, PatientId, UserId};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Patient,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Doctor => write!(f, "doctor"),
            Role::Patient => write!(f, "patient"),
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "doctor" => Ok(Role::Doctor),
            "patient" => Ok(Role::Patient),
            other => Err(AppError::ValidationError(format!("Unknown role: {}", other))),
        }
    }
}

/// The acting party of a request, resolved once at authentication time.
///
/// Profile-scoped roles carry the id of their profile record so ownership
/// checks never need to look the profile up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "profile_id", rename_all = "lowercase")]
pub enum Actor {
    Admin,
    Doctor(DoctorId),
    Patient(PatientId),
}

impl Actor {
    pub fn role(&self) -> Role {
        match self {
            Actor::Admin => Role::Admin,
            Actor::Doctor(_) => Role::Doctor,
            Actor::Patient(_) => Role::Patient,
        }
    }
}

/// Inserted into request extensions by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub actor: Actor,
}

impl AuthenticatedUser {
    pub fn role(&self) -> Role {
        self.actor.role()
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        match self.actor {
            Actor::Admin => Ok(()),
            _ => Err(AppError::Forbidden("Admin access required".to_string())),
        }
    }

    pub fn require_doctor(&self) -> Result<DoctorId, AppError> {
        match self.actor {
            Actor::Doctor(doctor_id) => Ok(doctor_id),
            _ => Err(AppError::Forbidden("Doctor access required".to_string())),
        }
    }

    pub fn require_patient(&self) -> Result<PatientId, AppError> {
        match self.actor {
            Actor::Patient(patient_id) => Ok(patient_id),
            _ => Err(AppError::Forbidden("Patient access required".to_string())),
        }
    }
}

/// Value stored in the session store under the digest of an opaque token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: UserId,
    pub actor: Actor,
    pub issued_at: DateTime<Utc>,
}
