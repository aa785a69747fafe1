pub mod delivery;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod services;

pub use delivery::{sink_from_config, LogSink, Notification, NotificationSink, WebhookSink};
pub use error::NotificationError;
pub use models::{DoctorReport, ExportResult, RunSummary};
pub use scheduler::{CronSchedule, ScheduledTask, Scheduler};
pub use services::export::ExportService;
pub use services::jobs::{MonthlyReportTask, NotificationJobs, ReminderTask};
