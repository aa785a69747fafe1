// libs/auth-cell/src/services/account.rs
use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use shared_database::{EntityStore, StoreError};
use shared_models::auth::Role;
use shared_models::entities::{Patient, User, UserId};
use shared_models::error::AppError;
use shared_utils::password::PasswordService;
use shared_utils::session::SessionStore;
use shared_utils::state::AppState;
use shared_utils::validation::{non_blank, parse_optional_date, required, validate_email};

use crate::models::{ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest, UserSummary};
use crate::services::profile::{actor_for, user_json};

pub struct LoginOutcome {
    pub token: String,
    pub user: Value,
}

pub struct AccountService {
    store: EntityStore,
    sessions: SessionStore,
    session_ttl_seconds: u64,
}

impl AccountService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            sessions: state.sessions.clone(),
            session_ttl_seconds: state.config.session_ttl_seconds(),
        }
    }

    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    /// Self-registration always creates a patient.
    #[instrument(skip(self, request))]
    pub async fn register(&self, request: RegisterRequest, now: NaiveDateTime) -> Result<UserSummary, AppError> {
        let username = required("username", request.username.as_deref())?;
        let email = required("email", request.email.as_deref())?;
        let password = required("password", request.password.as_deref())?;
        let full_name = required("full_name", request.full_name.as_deref())?;
        let phone = required("phone", request.phone.as_deref())?;

        validate_email(&email)?;
        PasswordService::validate_new_password(&password)?;
        let date_of_birth = parse_optional_date(request.date_of_birth.as_deref())?;
        let password_hash = PasswordService::hash_password(&password)?;

        let user = self
            .store
            .transaction(|t| {
                let user = t.insert_user(User {
                    id: 0,
                    username,
                    email,
                    password_hash,
                    role: Role::Patient,
                    full_name,
                    phone: Some(phone),
                    address: non_blank(request.address),
                    registered_at: now,
                    is_active: true,
                })?;
                t.insert_patient(Patient {
                    id: 0,
                    user_id: user.id,
                    date_of_birth,
                    blood_group: non_blank(request.blood_group),
                    emergency_contact: non_blank(request.emergency_contact),
                    medical_history: non_blank(request.medical_history),
                    allergies: non_blank(request.allergies),
                    created_at: now,
                })?;
                Ok::<_, StoreError>(user)
            })
            .await?;

        info!("Registered patient user {} ({})", user.id, user.username);
        Ok(UserSummary {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest, now: NaiveDateTime) -> Result<LoginOutcome, AppError> {
        let (username, password) = match (non_blank(request.username), request.password) {
            (Some(username), Some(password)) if !password.is_empty() => (username, password),
            _ => return Err(AppError::ValidationError("Username and password are required".to_string())),
        };

        let (user, actor, user_view) = self
            .store
            .read(|t| {
                let user = t
                    .user_by_username(&username)
                    .cloned()
                    .ok_or_else(|| AppError::Auth("Invalid username or password".to_string()))?;
                let actor = actor_for(t, &user)?;
                let view = user_json(t, &user, now.date());
                Ok::<_, AppError>((user, actor, view))
            })
            .await?;

        if !PasswordService::verify_password(&password, &user.password_hash)? {
            warn!("Failed login for {}", username);
            return Err(AppError::Auth("Invalid username or password".to_string()));
        }

        if !user.is_active {
            return Err(AppError::Forbidden(
                "Your account has been deactivated. Please contact admin.".to_string(),
            ));
        }

        let token = self.sessions.issue(user.id, actor).await?;
        info!("User {} logged in as {}", user.id, user.role);

        Ok(LoginOutcome { token, user: user_view })
    }

    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        self.sessions.revoke(token).await?;
        debug!("Session revoked");
        Ok(())
    }

    pub async fn me(&self, user_id: UserId, now: NaiveDateTime) -> Result<Value, AppError> {
        self.store
            .read(|t| {
                let user = t.user(user_id)?;
                Ok::<_, AppError>(user_json(t, user, now.date()))
            })
            .await
    }

    #[instrument(skip(self, request))]
    pub async fn change_password(&self, user_id: UserId, request: ChangePasswordRequest) -> Result<(), AppError> {
        let (old_password, new_password) = match (request.old_password, request.new_password) {
            (Some(old), Some(new)) if !old.is_empty() && !new.is_empty() => (old, new),
            _ => {
                return Err(AppError::ValidationError(
                    "Old password and new password are required".to_string(),
                ))
            }
        };

        let current_hash = self
            .store
            .read(|t| t.user(user_id).map(|u| u.password_hash.clone()))
            .await?;

        if !PasswordService::verify_password(&old_password, &current_hash)? {
            return Err(AppError::Auth("Incorrect old password".to_string()));
        }
        PasswordService::validate_new_password(&new_password)?;

        let new_hash = PasswordService::hash_password(&new_password)?;
        self.store
            .transaction(|t| t.update_user(user_id, |u| u.password_hash = new_hash).map(|_| ()))
            .await
            .map_err(AppError::from)?;

        info!("Password changed for user {}", user_id);
        Ok(())
    }

    #[instrument(skip(self, request))]
    pub async fn update_profile(
        &self,
        user_id: UserId,
        request: UpdateProfileRequest,
        now: NaiveDateTime,
    ) -> Result<Value, AppError> {
        let email = non_blank(request.email);
        if let Some(email) = &email {
            validate_email(email)?;
        }
        let date_of_birth = parse_optional_date(request.date_of_birth.as_deref())?;

        self.store
            .transaction(|t| {
                if let Some(email) = &email {
                    if t.user_by_email(email).is_some_and(|other| other.id != user_id) {
                        return Err(AppError::Conflict("Email already in use".to_string()));
                    }
                }

                let user = t.update_user(user_id, |u| {
                    if let Some(full_name) = non_blank(request.full_name) {
                        u.full_name = full_name;
                    }
                    if let Some(phone) = non_blank(request.phone) {
                        u.phone = Some(phone);
                    }
                    if let Some(address) = non_blank(request.address) {
                        u.address = Some(address);
                    }
                    if let Some(email) = email {
                        u.email = email;
                    }
                })?;

                if let Some(patient_id) = t.patient_by_user(user_id).map(|p| p.id) {
                    t.update_patient(patient_id, |p| {
                        if date_of_birth.is_some() {
                            p.date_of_birth = date_of_birth;
                        }
                        if let Some(blood_group) = non_blank(request.blood_group) {
                            p.blood_group = Some(blood_group);
                        }
                        if let Some(contact) = non_blank(request.emergency_contact) {
                            p.emergency_contact = Some(contact);
                        }
                        // Sent-but-empty clears these two.
                        if let Some(history) = request.medical_history {
                            p.medical_history = non_blank(Some(history));
                        }
                        if let Some(allergies) = request.allergies {
                            p.allergies = non_blank(Some(allergies));
                        }
                    })?;
                }

                Ok(user_json(t, &user, now.date()))
            })
            .await
    }
}
