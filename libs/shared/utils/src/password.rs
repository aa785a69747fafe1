// ==============================================================================
// PASSWORD HASHING
// ==============================================================================

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use tracing::instrument;

use shared_models::error::AppError;

pub const MIN_PASSWORD_LENGTH: usize = 6;

pub struct PasswordService;

impl PasswordService {
    #[instrument(skip(password))]
    pub fn hash_password(password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;
        Ok(password_hash.to_string())
    }

    /// `Ok(false)` for a wrong password; `Err` only for an unreadable hash.
    #[instrument(skip(password, hash))]
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Stored password hash is invalid: {}", e)))?;
        let argon2 = Argon2::default();

        match argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::Internal(format!("Password verification failed: {}", e))),
        }
    }

    pub fn validate_new_password(password: &str) -> Result<(), AppError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::ValidationError(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = PasswordService::hash_password("s3cret!").unwrap();
        assert!(PasswordService::verify_password("s3cret!", &hash).unwrap());
        assert!(!PasswordService::verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(PasswordService::verify_password("x", "not-a-hash").is_err());
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(PasswordService::validate_new_password("12345").is_err());
        assert!(PasswordService::validate_new_password("123456").is_ok());
    }
}
