use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::watch;

use notification_cell::{NotificationError, RunSummary, ScheduledTask, Scheduler};

#[derive(Default)]
struct CountingTask {
    runs: AtomicUsize,
}

#[async_trait]
impl ScheduledTask for CountingTask {
    fn name(&self) -> &str {
        "counting"
    }

    async fn run(&self, _now: NaiveDateTime) -> Result<RunSummary, NotificationError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(RunSummary::new("counting"))
    }
}

fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap().and_hms_opt(h, m, s).unwrap()
}

#[tokio::test]
async fn task_fires_once_per_matching_minute() {
    let task = Arc::new(CountingTask::default());
    let mut scheduler = Scheduler::new(Duration::from_secs(30));
    scheduler.register("0 8 * * *", task.clone()).unwrap();

    assert_eq!(scheduler.run_due(at(4, 7, 59, 30)).await.len(), 0);
    assert_eq!(scheduler.run_due(at(4, 8, 0, 10)).await.len(), 1);
    assert_eq!(scheduler.run_due(at(4, 8, 0, 40)).await.len(), 0);
    assert_eq!(scheduler.run_due(at(4, 8, 1, 0)).await.len(), 0);
    assert_eq!(scheduler.run_due(at(5, 8, 0, 5)).await.len(), 1);

    assert_eq!(task.runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn slow_ticks_still_fire_the_missed_run_once() {
    let task = Arc::new(CountingTask::default());
    let mut scheduler = Scheduler::new(Duration::from_secs(120));
    scheduler.register("0 8 * * *", task.clone()).unwrap();

    assert_eq!(scheduler.run_due(at(4, 7, 59, 30)).await.len(), 0);
    assert_eq!(scheduler.run_due(at(4, 8, 1, 30)).await.len(), 1);
    assert_eq!(scheduler.run_due(at(4, 8, 3, 30)).await.len(), 0);

    assert_eq!(task.runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn occurrences_missed_across_days_collapse_into_one_run() {
    let task = Arc::new(CountingTask::default());
    let mut scheduler = Scheduler::new(Duration::from_secs(30));
    scheduler.register("0 8 * * *", task.clone()).unwrap();

    scheduler.run_due(at(4, 7, 0, 0)).await;
    assert_eq!(scheduler.run_due(at(7, 12, 0, 0)).await.len(), 1);
    assert_eq!(scheduler.run_due(at(7, 12, 0, 30)).await.len(), 0);
    assert_eq!(scheduler.run_due(at(8, 8, 0, 0)).await.len(), 1);

    assert_eq!(task.runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn invalid_expression_is_not_registered() {
    let mut scheduler = Scheduler::new(Duration::from_secs(30));
    assert!(scheduler.register("every day", Arc::new(CountingTask::default())).is_err());
    assert_eq!(scheduler.job_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn run_loop_stops_on_shutdown() {
    let scheduler = Scheduler::new(Duration::from_secs(1));
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(rx));

    tokio::time::sleep(Duration::from_secs(3)).await;
    tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler stops")
        .unwrap();
}
