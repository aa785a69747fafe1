use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;

use shared_models::error::AppError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok())
        .as_ref()
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| AppError::ValidationError("Invalid date format. Use YYYY-MM-DD".to_string()))
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_time(raw: &str) -> Result<NaiveTime, AppError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| AppError::ValidationError("Invalid time format. Use HH:MM".to_string()))
}

pub fn parse_optional_date(raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => parse_date(value).map(Some),
        None => Ok(None),
    }
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    let email = email.trim();
    let well_formed = email_regex().is_some_and(|re| re.is_match(email));
    if well_formed && email.len() <= 254 {
        Ok(())
    } else {
        Err(AppError::ValidationError("Invalid email address".to_string()))
    }
}

/// Returns the trimmed value, or `"<field> is required"` when it is missing or blank.
pub fn required(field: &str, value: Option<&str>) -> Result<String, AppError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::ValidationError(format!("{} is required", field)))
}

/// Blank strings become `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
