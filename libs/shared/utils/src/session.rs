use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::debug;

use shared_database::KeyValueStore;
use shared_models::auth::{Actor, SessionRecord};
use shared_models::entities::UserId;
use shared_models::error::AppError;

/// Opaque bearer-token sessions. Only the SHA-256 digest of a token is used as
/// the storage key, so the store never holds a usable credential.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    ttl_seconds: u64,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, ttl_seconds: u64) -> Self {
        Self { kv, ttl_seconds }
    }

    pub async fn issue(&self, user_id: UserId, actor: Actor) -> Result<String, AppError> {
        let token = generate_token();
        let record = SessionRecord {
            user_id,
            actor,
            issued_at: Utc::now(),
        };
        let value = serde_json::to_string(&record)
            .map_err(|e| AppError::Internal(format!("Failed to encode session: {}", e)))?;

        self.kv
            .set(&session_key(&token), &value, Some(self.ttl_seconds))
            .await?;

        debug!("Issued session for user {}", user_id);
        Ok(token)
    }

    pub async fn lookup(&self, token: &str) -> Result<Option<SessionRecord>, AppError> {
        match self.kv.get(&session_key(token)).await? {
            Some(raw) => {
                let record = serde_json::from_str(&raw)
                    .map_err(|e| AppError::Internal(format!("Corrupt session record: {}", e)))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    pub async fn revoke(&self, token: &str) -> Result<(), AppError> {
        self.kv.delete(&session_key(token)).await?;
        Ok(())
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn session_key(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("session:{}", general_purpose::URL_SAFE_NO_PAD.encode(digest))
}
