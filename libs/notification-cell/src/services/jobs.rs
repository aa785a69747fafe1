// libs/notification-cell/src/services/jobs.rs
// ==============================================================================
// SCHEDULED JOBS - DAILY REMINDERS AND MONTHLY DOCTOR REPORTS
// ==============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, info, instrument, warn};

use shared_database::{EntityStore, KeyValueStore};
use shared_models::entities::{AppointmentId, AppointmentStatus};
use shared_utils::state::AppState;

use crate::delivery::{sink_from_config, Notification, NotificationSink};
use crate::error::NotificationError;
use crate::models::RunSummary;
use crate::scheduler::ScheduledTask;
use crate::services::reports::{build_monthly_reports, previous_month, render_html};

const REMINDER_KEY_TTL_SECONDS: u64 = 48 * 60 * 60;
const REPORT_KEY_TTL_SECONDS: u64 = 45 * 24 * 60 * 60;

pub const REMINDER_JOB: &str = "daily-reminders";
pub const REPORT_JOB: &str = "monthly-reports";

#[derive(Debug, Clone)]
struct Reminder {
    appointment_id: AppointmentId,
    patient_name: String,
    patient_email: String,
    doctor_name: String,
    department: String,
    date: NaiveDate,
    time: NaiveTime,
}

impl Reminder {
    fn notification(&self) -> Notification {
        Notification::text(
            Some(self.patient_email.clone()),
            "Appointment Reminder",
            format!(
                "Dear {},\n\nThis is a reminder that you have an appointment today:\n\n\
                 Doctor: Dr. {}\nDepartment: {}\nDate: {}\nTime: {}\n\n\
                 Please arrive 10 minutes early.\n\nHospital Management System",
                self.patient_name,
                self.doctor_name,
                self.department,
                self.date,
                self.time.format("%I:%M %p"),
            ),
        )
    }
}

/// Reminder and report jobs. Both read the store under its read lock, then
/// deliver with the lock released. Re-running a job is safe: every delivery
/// claims an idempotency key in the key-value store first.
pub struct NotificationJobs {
    store: EntityStore,
    kv: Arc<dyn KeyValueStore>,
    sink: Arc<dyn NotificationSink>,
}

impl NotificationJobs {
    pub fn new(store: EntityStore, kv: Arc<dyn KeyValueStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { store, kv, sink }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.store.clone(), state.cache.clone(), sink_from_config(&state.config))
    }

    /// Claims `key`, delivers, and releases the key again if delivery fails
    /// so a later run can retry.
    async fn deliver_once(
        &self,
        key: &str,
        ttl_seconds: u64,
        notification: &Notification,
        summary: &mut RunSummary,
    ) {
        match self.kv.set_nx(key, "sent", ttl_seconds).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Skipping {}: already delivered", key);
                summary.skipped += 1;
                return;
            }
            Err(e) => {
                warn!("Could not claim {}: {}", key, e);
                summary.failed += 1;
                return;
            }
        }

        match self.sink.deliver(notification).await {
            Ok(()) => summary.sent += 1,
            Err(e) => {
                warn!("Delivery for {} failed: {}", key, e);
                summary.failed += 1;
                if let Err(e) = self.kv.delete(key).await {
                    warn!("Could not release {}: {}", key, e);
                }
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn run_reminders(&self, now: NaiveDateTime) -> Result<RunSummary, NotificationError> {
        let today = now.date();

        let (reminders, missing) = self
            .store
            .read(|t| {
                let mut due: Vec<_> = t
                    .appointments()
                    .filter(|a| a.date == today && a.status == AppointmentStatus::Booked)
                    .collect();
                due.sort_by_key(|a| (a.time, a.id));

                let mut missing = 0;
                let reminders: Vec<Reminder> = due
                    .into_iter()
                    .filter_map(|a| {
                        let resolved = (|| {
                            let patient = t.patient(a.patient_id).ok()?;
                            let patient_user = t.user(patient.user_id).ok()?;
                            let doctor = t.doctor(a.doctor_id).ok()?;
                            let doctor_user = t.user(doctor.user_id).ok()?;
                            let department = t.department(doctor.department_id).ok()?;
                            Some(Reminder {
                                appointment_id: a.id,
                                patient_name: patient_user.full_name.clone(),
                                patient_email: patient_user.email.clone(),
                                doctor_name: doctor_user.full_name.clone(),
                                department: department.name.clone(),
                                date: a.date,
                                time: a.time,
                            })
                        })();
                        if resolved.is_none() {
                            warn!("Skipping reminder for appointment {}: referenced record missing", a.id);
                            missing += 1;
                        }
                        resolved
                    })
                    .collect();
                (reminders, missing)
            })
            .await;

        info!("Found {} appointments for {}", reminders.len() + missing, today);

        let mut summary = RunSummary::new(REMINDER_JOB);
        summary.selected = reminders.len() + missing;
        summary.skipped = missing;

        for reminder in &reminders {
            let key = format!("reminder:{}:{}", today, reminder.appointment_id);
            self.deliver_once(&key, REMINDER_KEY_TTL_SECONDS, &reminder.notification(), &mut summary)
                .await;
        }

        Ok(summary)
    }

    #[instrument(skip(self))]
    pub async fn run_monthly_reports(&self, now: NaiveDateTime) -> Result<RunSummary, NotificationError> {
        let today = now.date();
        let (start, end) = previous_month(today)
            .ok_or_else(|| NotificationError::Delivery(format!("no previous month for {}", today)))?;

        let reports = self.store.read(|t| build_monthly_reports(t, start, end)).await;
        info!("Generating reports for {} doctors ({} to {})", reports.len(), start, end);

        let mut summary = RunSummary::new(REPORT_JOB);
        summary.selected = reports.len();

        for report in &reports {
            debug!(
                "Report for doctor {}: total={} completed={} cancelled={}",
                report.doctor_id, report.total, report.completed, report.cancelled
            );
            let notification = Notification::html(
                Some(report.doctor_email.clone()),
                format!("Monthly Activity Report - {}", start.format("%B %Y")),
                render_html(report, today),
            );
            let key = format!("monthly-report:{}:{}", start.format("%Y-%m"), report.doctor_id);
            self.deliver_once(&key, REPORT_KEY_TTL_SECONDS, &notification, &mut summary)
                .await;
        }

        Ok(summary)
    }
}

pub struct ReminderTask(pub Arc<NotificationJobs>);

#[async_trait]
impl ScheduledTask for ReminderTask {
    fn name(&self) -> &str {
        REMINDER_JOB
    }

    async fn run(&self, now: NaiveDateTime) -> Result<RunSummary, NotificationError> {
        self.0.run_reminders(now).await
    }
}

pub struct MonthlyReportTask(pub Arc<NotificationJobs>);

#[async_trait]
impl ScheduledTask for MonthlyReportTask {
    fn name(&self) -> &str {
        REPORT_JOB
    }

    async fn run(&self, now: NaiveDateTime) -> Result<RunSummary, NotificationError> {
        self.0.run_monthly_reports(now).await
    }
}
