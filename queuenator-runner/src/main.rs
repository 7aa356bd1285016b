use std::sync::Arc;

use log::{error, info};
use queuenator_config::parse_config;
use queuenator_engine::{HandlerRegistry, QueueRunner, SystemClock};
use queuenator_models::{
    core::{Task, TaskSchedule},
    errors::SendableError,
};
use queuenator_store::{SqliteStore, TaskStore};
use queuenator_utilities::startup;
use tokio::{sync::Notify, task::JoinHandle};

use queuenator_runner::{
    job::JobRegistry,
    queue_job::{QueueDrainJob, QUEUE_TASK_KEY},
    scheduler_loop, Runner,
};

#[tokio::main]
async fn main() -> Result<(), SendableError> {
    let config = parse_config()?;
    startup::startup("Queuenator Runner", &config.log_file)?;

    info!("Opening database {}", config.database);
    let store = Arc::new(SqliteStore::new(&config.database).await?);
    store.create_tables().await?;

    let clock = Arc::new(SystemClock);

    // Queue handlers are registered here at startup. The stock binary ships
    // none; embedders register theirs before building the QueueRunner.
    let handlers = Arc::new(HandlerRegistry::new());
    info!("{} queue handler(s) registered", handlers.len());

    let queue_runner = Arc::new(
        QueueRunner::new(store.clone(), handlers, clock.clone())
            .with_lease(chrono::Duration::seconds(config.lease_seconds))
            .with_fetch_limit(config.fetch_limit),
    );

    let mut jobs = JobRegistry::new();
    jobs.register(Arc::new(QueueDrainJob::new(queue_runner.clone())));

    // Seeding is idempotent and does not clobber operator state such as a
    // disabled flag.
    store
        .upsert_task(&Task::new(
            QUEUE_TASK_KEY,
            TaskSchedule::Interval(config.queue_interval_seconds),
        ))
        .await?;

    let runner = Arc::new(Runner {
        tasks: store.clone(),
        settings: store.clone(),
        jobs: Arc::new(jobs),
        clock,
    });

    let notify = Arc::new(Notify::new());

    info!("Starting scheduler loop");
    let notify_scheduler = notify.clone();
    let loop_config = config.clone();
    let runner_clone = runner.clone();
    let scheduler_task: JoinHandle<Result<(), SendableError>> = tokio::spawn(async move {
        if let Err(err) = scheduler_loop(&runner_clone, notify_scheduler, &loop_config).await {
            error!("Scheduler loop terminated with error: {}", err);
        }
        Ok(())
    });

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for Ctrl+C");
    info!("Received shutdown signal. Shutting down...");
    notify.notify_waiters();

    if let Err(err) = tokio::try_join!(scheduler_task) {
        error!("Error while shutting down runner: {:?}", err);
    }

    info!("Runner shutdown complete.");
    Ok(())
}
