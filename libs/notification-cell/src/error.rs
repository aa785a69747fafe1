use thiserror::Error;

use shared_database::KvError;
use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid cron expression '{0}': {1}")]
    InvalidCron(String, String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Export write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Kv(#[from] KvError),
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound(_) => AppError::NotFound(err.to_string()),
            NotificationError::InvalidCron(..) => AppError::BadRequest(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}
