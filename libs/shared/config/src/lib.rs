use std::env;
use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_REMINDER_CRON: &str = "0 8 * * *";
pub const DEFAULT_REPORT_CRON: &str = "0 9 1 * *";
pub const MAX_SCHEDULER_TICK_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub data_file: Option<PathBuf>,
    pub redis_url: Option<String>,
    pub session_ttl_hours: u64,
    pub admin_username: String,
    pub admin_email: String,
    pub admin_password: String,
    pub admin_full_name: String,
    pub export_dir: PathBuf,
    pub reminder_cron: String,
    pub report_cron: String,
    pub scheduler_tick_seconds: u64,
    pub notification_webhook_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            data_file: None,
            redis_url: None,
            session_ttl_hours: 168,
            admin_username: "admin".to_string(),
            admin_email: "admin@hospital.com".to_string(),
            admin_password: "admin123".to_string(),
            admin_full_name: "System Administrator".to_string(),
            export_dir: PathBuf::from("exports"),
            reminder_cron: DEFAULT_REMINDER_CRON.to_string(),
            report_cron: DEFAULT_REPORT_CRON.to_string(),
            scheduler_tick_seconds: 30,
            notification_webhook_url: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| {
                    warn!("BIND_ADDR not set, using {}", defaults.bind_addr);
                    defaults.bind_addr.clone()
                }),
            data_file: optional_var("DATA_FILE").map(PathBuf::from),
            redis_url: optional_var("REDIS_URL"),
            session_ttl_hours: parsed_var("SESSION_TTL_HOURS", defaults.session_ttl_hours),
            admin_username: env::var("ADMIN_USERNAME")
                .unwrap_or(defaults.admin_username),
            admin_email: env::var("ADMIN_EMAIL")
                .unwrap_or(defaults.admin_email),
            admin_password: env::var("ADMIN_PASSWORD")
                .unwrap_or_else(|_| {
                    warn!("ADMIN_PASSWORD not set, using the default admin password");
                    defaults.admin_password.clone()
                }),
            admin_full_name: env::var("ADMIN_FULL_NAME")
                .unwrap_or(defaults.admin_full_name),
            export_dir: env::var("EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.export_dir),
            reminder_cron: env::var("REMINDER_CRON")
                .unwrap_or(defaults.reminder_cron),
            report_cron: env::var("REPORT_CRON")
                .unwrap_or(defaults.report_cron),
            scheduler_tick_seconds: scheduler_tick(parsed_var(
                "SCHEDULER_TICK_SECONDS",
                defaults.scheduler_tick_seconds,
            )),
            notification_webhook_url: optional_var("NOTIFICATION_WEBHOOK_URL"),
        };

        if config.data_file.is_none() {
            warn!("DATA_FILE not set - entity store will not survive restarts");
        }

        if config.redis_url.is_none() {
            warn!("REDIS_URL not set - sessions and job keys are kept in process memory");
        }

        config
    }

    pub fn is_persistent(&self) -> bool {
        self.data_file.is_some()
    }

    pub fn is_webhook_configured(&self) -> bool {
        self.notification_webhook_url
            .as_deref()
            .map(|url| !url.is_empty())
            .unwrap_or(false)
    }

    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_hours * 3600
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed_var(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

/// Scheduler ticks stay between one second and one minute.
fn scheduler_tick(seconds: u64) -> u64 {
    let clamped = seconds.clamp(1, MAX_SCHEDULER_TICK_SECONDS);
    if clamped != seconds {
        warn!("SCHEDULER_TICK_SECONDS={} is out of range, using {}", seconds, clamped);
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_tick_is_capped_at_a_minute() {
        assert_eq!(scheduler_tick(30), 30);
        assert_eq!(scheduler_tick(0), 1);
        assert_eq!(scheduler_tick(120), MAX_SCHEDULER_TICK_SECONDS);
    }
}
