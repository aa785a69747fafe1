use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use notification_cell::{MonthlyReportTask, NotificationJobs, ReminderTask, Scheduler};
use shared_config::AppConfig;
use shared_database::seed::seed_defaults;
use shared_database::{EntityStore, KeyValueStore, MemoryKeyValueStore, RedisKeyValueStore};
use shared_utils::password::PasswordService;
use shared_utils::state::AppState;

async fn open_store(config: &AppConfig) -> anyhow::Result<EntityStore> {
    match &config.data_file {
        Some(path) => EntityStore::open(path)
            .await
            .with_context(|| format!("opening data file {}", path.display())),
        None => Ok(EntityStore::in_memory()),
    }
}

async fn open_key_value_store(config: &AppConfig) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    match &config.redis_url {
        Some(url) => {
            let redis = RedisKeyValueStore::connect(url).await.context("connecting to Redis")?;
            Ok(Arc::new(redis))
        }
        None => Ok(Arc::new(MemoryKeyValueStore::new())),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting hospital appointment API");

    let config = AppConfig::from_env();
    let store = open_store(&config).await?;
    let kv = open_key_value_store(&config).await?;

    let admin_hash = PasswordService::hash_password(&config.admin_password)
        .context("hashing admin password")?;
    let seeded = seed_defaults(&store, &config, &admin_hash, Utc::now().naive_utc())
        .await
        .context("seeding default records")?;
    info!(
        "Seed complete (admin created: {}, departments created: {})",
        seeded.admin_created, seeded.departments_created
    );

    let bind_addr = config.bind_addr.clone();
    let reminder_cron = config.reminder_cron.clone();
    let report_cron = config.report_cron.clone();
    let tick = Duration::from_secs(config.scheduler_tick_seconds);

    let state = Arc::new(AppState::new(config, store, kv));
    let jobs = Arc::new(NotificationJobs::from_state(&state));

    let mut scheduler = Scheduler::new(tick);
    scheduler.register(&reminder_cron, Arc::new(ReminderTask(jobs.clone())))?;
    scheduler.register(&report_cron, Arc::new(MonthlyReportTask(jobs.clone())))?;
    info!("Scheduler ready with {} jobs", scheduler.job_count());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(state, jobs)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    info!("Listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        warn!("Scheduler task ended abnormally: {}", e);
    }
    Ok(())
}
