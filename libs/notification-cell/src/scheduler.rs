// libs/notification-cell/src/scheduler.rs
// ==============================================================================
// CRON SCHEDULER - MINUTE-RESOLUTION JOB TRIGGERS
// ==============================================================================

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone, Utc};
use cron::Schedule;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::error::NotificationError;
use crate::models::RunSummary;

const CRON_FIELDS: usize = 5;

/// Five-field cron expression (minute, hour, day of month, month, day of
/// week) evaluated in UTC. Day-of-week names (`Mon-Fri`) are accepted.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: Schedule,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, NotificationError> {
        let fields = expression.split_whitespace().count();
        if fields != CRON_FIELDS {
            return Err(NotificationError::InvalidCron(
                expression.to_string(),
                format!("expected {} fields, found {}", CRON_FIELDS, fields),
            ));
        }

        // The cron crate wants a leading seconds field.
        let schedule = Schedule::from_str(&format!("0 {}", expression.trim()))
            .map_err(|e| NotificationError::InvalidCron(expression.to_string(), e.to_string()))?;

        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `after`.
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        self.schedule
            .after(&Utc.from_utc_datetime(&after))
            .next()
            .map(|at| at.naive_utc())
    }
}

// ==============================================================================
// SCHEDULER
// ==============================================================================

#[async_trait]
pub trait ScheduledTask: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, now: NaiveDateTime) -> Result<RunSummary, NotificationError>;
}

struct ScheduledEntry {
    schedule: CronSchedule,
    task: Arc<dyn ScheduledTask>,
    next_due: Option<NaiveDateTime>,
}

pub struct Scheduler {
    entries: Vec<ScheduledEntry>,
    tick: Duration,
}

impl Scheduler {
    pub fn new(tick: Duration) -> Self {
        Self {
            entries: Vec::new(),
            tick,
        }
    }

    pub fn register(&mut self, expression: &str, task: Arc<dyn ScheduledTask>) -> Result<(), NotificationError> {
        let schedule = CronSchedule::parse(expression)?;
        info!(
            "Registered job '{}' with schedule '{}' (next run {:?})",
            task.name(),
            expression,
            schedule.next_after(Utc::now().naive_utc())
        );
        self.entries.push(ScheduledEntry {
            schedule,
            task,
            next_due: None,
        });
        Ok(())
    }

    pub fn job_count(&self) -> usize {
        self.entries.len()
    }

    /// Runs every task whose next occurrence is at or before `now`, then
    /// moves it to the first occurrence after `now`. Occurrences missed
    /// between two calls collapse into a single run. The first call only
    /// anchors each task.
    #[instrument(skip(self))]
    pub async fn run_due(&mut self, now: NaiveDateTime) -> Vec<RunSummary> {
        let mut summaries = Vec::new();

        for entry in self.entries.iter_mut() {
            let due = match entry.next_due {
                Some(due) => due,
                None => {
                    entry.next_due = entry.schedule.next_after(now);
                    continue;
                }
            };
            if now < due {
                continue;
            }
            entry.next_due = entry.schedule.next_after(now);
            if now.signed_duration_since(due).num_seconds() >= 60 {
                warn!("Job '{}' is running late (was due at {})", entry.task.name(), due);
            }

            debug!("Running job '{}'", entry.task.name());
            match entry.task.run(now).await {
                Ok(summary) => {
                    info!(
                        "Job '{}' finished: selected={} sent={} skipped={} failed={}",
                        summary.job, summary.selected, summary.sent, summary.skipped, summary.failed
                    );
                    summaries.push(summary);
                }
                Err(e) => error!("Job '{}' failed: {}", entry.task.name(), e),
            }
        }

        summaries
    }

    /// Ticks until `shutdown` flips to true or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting job scheduler with {} jobs", self.entries.len());
        let mut interval = tokio::time::interval(self.tick);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_due(Utc::now().naive_utc()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received, stopping scheduler");
                        break;
                    }
                }
            }
        }
    }
}
