pub mod job;
pub mod queue_job;
pub mod schedule;

use std::sync::Arc;
use std::time;

use chrono::Duration;
use log::{debug, error, info, warn};
use queuenator_config::Config;
use queuenator_engine::{Clock, Cutoff, EngineError};
use queuenator_models::core::{Task, TaskOutcome};
use queuenator_store::{SettingsStore, TaskStore};
use tokio::sync::Notify;

use job::{JobContext, JobRegistry};

/// Everything the scheduler loop needs, injected explicitly.
pub struct Runner {
    pub tasks: Arc<dyn TaskStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub jobs: Arc<JobRegistry>,
    pub clock: Arc<dyn Clock>,
}

pub async fn scheduler_loop(
    runner: &Runner,
    notify: Arc<Notify>,
    config: &Config,
) -> Result<(), EngineError> {
    info!(
        "Scheduler started with {} registered job(s)",
        runner.jobs.len()
    );

    loop {
        let start = time::Instant::now();
        tokio::select! {
            _ = notify.notified() => {
                info!("Runner received shutdown signal.");
                break;
            }
            _ = tick_sleep(config) => {
                run_scheduler_iteration(runner, config).await?;
            }
        }
        debug!(
            "Scheduler iteration took {} seconds",
            start.elapsed().as_secs_f64()
        );
    }

    Ok(())
}

async fn tick_sleep(config: &Config) {
    tokio::time::sleep(tokio::time::Duration::from_secs(config.tick_seconds)).await;
}

/// One sweep over all tasks. A failing task is logged and does not stop the
/// sweep; its next scheduled run retries from the last persisted state.
pub async fn run_scheduler_iteration(runner: &Runner, config: &Config) -> Result<(), EngineError> {
    debug!("Fetching tasks");
    let tasks = runner.tasks.fetch_all_tasks().await?;

    for task in tasks {
        if let Err(err) = process_one_task(runner, &task, config).await {
            error!("task {} errored: {}", task.key, err);
        }
    }

    Ok(())
}

/// Drive one task through its lifecycle: Idle -> Running -> Idle on success,
/// Disabled when the job reports its precondition is permanently false,
/// Failed (logged, retried next time) on error.
pub async fn process_one_task(
    runner: &Runner,
    task: &Task,
    config: &Config,
) -> Result<(), EngineError> {
    let now = runner.clock.now();

    if task.next_execution.is_none() {
        runner
            .tasks
            .update_task_execution(&task.key, None, Some(now))
            .await?;
        return Ok(());
    }

    if !task.is_due(now) {
        return Ok(());
    }

    let Some(job) = runner.jobs.resolve(&task.key) else {
        warn!(
            "no job registered for task {}, rescheduling without running",
            task.key
        );
        let next = schedule::next_occurrence(&task.schedule, now)?;
        runner
            .tasks
            .update_task_execution(&task.key, None, Some(next))
            .await?;
        return Ok(());
    };

    debug!("Running task {}", task.key);
    let ctx = JobContext {
        clock: runner.clock.clone(),
        cutoff: Cutoff::after(
            &*runner.clock,
            Duration::seconds(config.cutoff_window_seconds),
        ),
        settings: runner.settings.clone(),
    };

    let started = now;
    let wall = time::Instant::now();
    let result = job.execute(&ctx).await;
    let duration_ms = wall.elapsed().as_millis() as i64;

    match result {
        Ok(TaskOutcome::Quiet) => {
            runner
                .tasks
                .log_task_run(&task.key, started, duration_ms, true, None)
                .await?;
        }
        Ok(TaskOutcome::Logged(message)) => {
            info!("task {}: {}", task.key, message);
            runner
                .tasks
                .log_task_run(&task.key, started, duration_ms, true, Some(&message))
                .await?;
        }
        Ok(TaskOutcome::Disable(reason)) => {
            info!("task {} disabled itself: {}", task.key, reason);
            runner.tasks.set_task_enabled(&task.key, false).await?;
            runner
                .tasks
                .log_task_run(&task.key, started, duration_ms, true, Some(&reason))
                .await?;
        }
        Err(err) => {
            error!("task {} failed: {}", task.key, err);
            runner
                .tasks
                .log_task_run(&task.key, started, duration_ms, false, Some(&err.to_string()))
                .await?;
        }
    }

    let next = schedule::next_occurrence(&task.schedule, runner.clock.now())?;
    runner
        .tasks
        .update_task_execution(&task.key, Some(started), Some(next))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ScheduledJob;
    use crate::queue_job::{QueueDrainJob, QUEUE_ENABLED_SETTING, QUEUE_TASK_KEY};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use queuenator_engine::{
        HandlerRegistry, ManualClock, QueueHandler, QueueRunner, Step,
    };
    use queuenator_models::core::{NewQueueEntry, TaskSchedule};
    use queuenator_store::{MemoryStore, QueueStore};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum TestBehavior {
        Quiet,
        Logged(&'static str),
        Disable(&'static str),
        Fail(&'static str),
    }

    struct TestJob {
        key: &'static str,
        behavior: TestBehavior,
        executions: AtomicUsize,
    }

    impl TestJob {
        fn new(key: &'static str, behavior: TestBehavior) -> Self {
            Self {
                key,
                behavior,
                executions: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ScheduledJob for TestJob {
        fn key(&self) -> &'static str {
            self.key
        }

        async fn execute(&self, _ctx: &JobContext) -> Result<TaskOutcome, EngineError> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                TestBehavior::Quiet => Ok(TaskOutcome::Quiet),
                TestBehavior::Logged(msg) => Ok(TaskOutcome::Logged(msg.to_string())),
                TestBehavior::Disable(reason) => Ok(TaskOutcome::Disable(reason.to_string())),
                TestBehavior::Fail(msg) => Err(EngineError::handler("core", "test", *msg)),
            }
        }
    }

    fn start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn test_config() -> Config {
        Config {
            database: ":memory:".to_string(),
            tick_seconds: 1,
            cutoff_window_seconds: 30,
            lease_seconds: 300,
            fetch_limit: 50,
            queue_interval_seconds: 60,
            log_file: "test.log".to_string(),
        }
    }

    fn make_runner(store: &MemoryStore, clock: &ManualClock, jobs: JobRegistry) -> Runner {
        Runner {
            tasks: Arc::new(store.clone()),
            settings: Arc::new(store.clone()),
            jobs: Arc::new(jobs),
            clock: Arc::new(clock.clone()),
        }
    }

    async fn seed_due_task(store: &MemoryStore, key: &str, clock: &ManualClock) {
        let task = Task::new(key, TaskSchedule::Interval(60));
        store.upsert_task(&task).await.unwrap();
        store
            .update_task_execution(key, None, Some(clock.now() - Duration::seconds(1)))
            .await
            .unwrap();
    }

    fn fetch_one_task<'a>(tasks: &'a [Task], key: &str) -> &'a Task {
        tasks.iter().find(|t| t.key == key).unwrap()
    }

    #[tokio::test]
    async fn first_sweep_sets_initial_execution_without_running() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(start());
        let job = Arc::new(TestJob::new("core.cleanup", TestBehavior::Quiet));
        let mut jobs = JobRegistry::new();
        jobs.register(job.clone());
        let runner = make_runner(&store, &clock, jobs);

        store
            .upsert_task(&Task::new("core.cleanup", TaskSchedule::Interval(60)))
            .await
            .unwrap();

        run_scheduler_iteration(&runner, &test_config()).await.unwrap();

        assert_eq!(job.executions.load(Ordering::SeqCst), 0);
        let tasks = store.fetch_all_tasks().await.unwrap();
        assert_eq!(
            fetch_one_task(&tasks, "core.cleanup").next_execution,
            Some(clock.now())
        );
    }

    #[tokio::test]
    async fn due_task_runs_and_is_rescheduled() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(start());
        let job = Arc::new(TestJob::new("core.cleanup", TestBehavior::Logged("did things")));
        let mut jobs = JobRegistry::new();
        jobs.register(job.clone());
        let runner = make_runner(&store, &clock, jobs);

        seed_due_task(&store, "core.cleanup", &clock).await;
        run_scheduler_iteration(&runner, &test_config()).await.unwrap();

        assert_eq!(job.executions.load(Ordering::SeqCst), 1);

        let tasks = store.fetch_all_tasks().await.unwrap();
        let task = fetch_one_task(&tasks, "core.cleanup");
        assert_eq!(task.last_run, Some(clock.now()));
        assert_eq!(
            task.next_execution,
            Some(clock.now() + Duration::seconds(60))
        );

        let runs = store.fetch_task_runs(0, i64::MAX).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].success);
        assert_eq!(runs[0].message.as_deref(), Some("did things"));
    }

    #[tokio::test]
    async fn quiet_outcome_logs_a_run_with_no_message() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(start());
        let mut jobs = JobRegistry::new();
        jobs.register(Arc::new(TestJob::new("core.cleanup", TestBehavior::Quiet)));
        let runner = make_runner(&store, &clock, jobs);

        seed_due_task(&store, "core.cleanup", &clock).await;
        run_scheduler_iteration(&runner, &test_config()).await.unwrap();

        let runs = store.fetch_task_runs(0, i64::MAX).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].success);
        assert_eq!(runs[0].message, None);
    }

    #[tokio::test]
    async fn disable_outcome_flips_the_enabled_flag() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(start());
        let job = Arc::new(TestJob::new(
            "forums.archive",
            TestBehavior::Disable("archiving is off"),
        ));
        let mut jobs = JobRegistry::new();
        jobs.register(job.clone());
        let runner = make_runner(&store, &clock, jobs);

        seed_due_task(&store, "forums.archive", &clock).await;
        run_scheduler_iteration(&runner, &test_config()).await.unwrap();

        let tasks = store.fetch_all_tasks().await.unwrap();
        assert!(!fetch_one_task(&tasks, "forums.archive").enabled);

        // Disabled means not due any more, even when the time comes around.
        clock.advance(Duration::seconds(3600));
        run_scheduler_iteration(&runner, &test_config()).await.unwrap();
        assert_eq!(job.executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_recorded_and_task_stays_enabled() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(start());
        let mut jobs = JobRegistry::new();
        jobs.register(Arc::new(TestJob::new(
            "core.cleanup",
            TestBehavior::Fail("datasource went away"),
        )));
        let runner = make_runner(&store, &clock, jobs);

        seed_due_task(&store, "core.cleanup", &clock).await;
        run_scheduler_iteration(&runner, &test_config()).await.unwrap();

        let runs = store.fetch_task_runs(0, i64::MAX).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(!runs[0].success);
        assert!(runs[0]
            .message
            .as_deref()
            .unwrap()
            .contains("datasource went away"));

        let tasks = store.fetch_all_tasks().await.unwrap();
        let task = fetch_one_task(&tasks, "core.cleanup");
        assert!(task.enabled);
        // Retry is scheduled.
        assert!(task.next_execution.unwrap() > clock.now());
    }

    #[tokio::test]
    async fn task_without_registered_job_is_rescheduled_not_run() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(start());
        let runner = make_runner(&store, &clock, JobRegistry::new());

        seed_due_task(&store, "gone.plugin", &clock).await;
        run_scheduler_iteration(&runner, &test_config()).await.unwrap();

        assert!(store.fetch_task_runs(0, i64::MAX).await.unwrap().is_empty());
        let tasks = store.fetch_all_tasks().await.unwrap();
        assert!(fetch_one_task(&tasks, "gone.plugin").next_execution.unwrap() > clock.now());
    }

    struct TenRecordHandler;

    #[async_trait]
    impl QueueHandler for TenRecordHandler {
        async fn run(&self, _data: &Value, offset: i64) -> Result<Step, EngineError> {
            if offset >= 10 {
                return Ok(Step::Done);
            }
            Ok(Step::Processed((offset + 4).min(10)))
        }
    }

    fn queue_setup(store: &MemoryStore, clock: &ManualClock) -> (Runner, Arc<QueueRunner>) {
        let mut handlers = HandlerRegistry::new();
        handlers.register("core", "reindex", Arc::new(TenRecordHandler));
        let queue_runner = Arc::new(QueueRunner::new(
            Arc::new(store.clone()),
            Arc::new(handlers),
            Arc::new(clock.clone()),
        ));

        let mut jobs = JobRegistry::new();
        jobs.register(Arc::new(QueueDrainJob::new(queue_runner.clone())));
        (make_runner(store, clock, jobs), queue_runner)
    }

    #[tokio::test]
    async fn queue_drain_job_end_to_end() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(start());
        let (runner, queue_runner) = queue_setup(&store, &clock);

        queue_runner
            .enqueue(NewQueueEntry::new("core", "reindex", json!({})))
            .await
            .unwrap()
            .unwrap();

        seed_due_task(&store, QUEUE_TASK_KEY, &clock).await;
        run_scheduler_iteration(&runner, &test_config()).await.unwrap();

        assert_eq!(QueueStore::count(&store).await.unwrap(), 0);
        let runs = store.fetch_task_runs(0, i64::MAX).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].success);
        assert!(runs[0].message.as_deref().unwrap().contains("drained 1"));
    }

    #[tokio::test]
    async fn queue_drain_job_disables_itself_when_off_and_empty() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(start());
        let (runner, _queue_runner) = queue_setup(&store, &clock);

        store.set_setting(QUEUE_ENABLED_SETTING, "0").await.unwrap();
        seed_due_task(&store, QUEUE_TASK_KEY, &clock).await;
        run_scheduler_iteration(&runner, &test_config()).await.unwrap();

        let tasks = store.fetch_all_tasks().await.unwrap();
        assert!(!fetch_one_task(&tasks, QUEUE_TASK_KEY).enabled);
    }

    #[tokio::test]
    async fn queue_drain_job_still_drains_backlog_when_off() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(start());
        let (runner, queue_runner) = queue_setup(&store, &clock);

        store.set_setting(QUEUE_ENABLED_SETTING, "0").await.unwrap();
        queue_runner
            .enqueue(NewQueueEntry::new("core", "reindex", json!({})))
            .await
            .unwrap()
            .unwrap();

        seed_due_task(&store, QUEUE_TASK_KEY, &clock).await;
        run_scheduler_iteration(&runner, &test_config()).await.unwrap();

        assert_eq!(QueueStore::count(&store).await.unwrap(), 0);
        let tasks = store.fetch_all_tasks().await.unwrap();
        assert!(fetch_one_task(&tasks, QUEUE_TASK_KEY).enabled);
    }
}
