use std::sync::Arc;

use async_trait::async_trait;
use queuenator_engine::{EngineError, QueueRunner};
use queuenator_models::core::TaskOutcome;

use crate::job::{JobContext, ScheduledJob};

pub const QUEUE_TASK_KEY: &str = "queue.run";
pub const QUEUE_ENABLED_SETTING: &str = "queue.enabled";

/// The built-in task: drains due queue entries inside the cutoff window.
///
/// When queue processing has been switched off and no backlog remains, the
/// job disables its own task rather than waking up forever for nothing. An
/// existing backlog is still drained after the switch-off.
pub struct QueueDrainJob {
    runner: Arc<QueueRunner>,
}

impl QueueDrainJob {
    pub fn new(runner: Arc<QueueRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ScheduledJob for QueueDrainJob {
    fn key(&self) -> &'static str {
        QUEUE_TASK_KEY
    }

    fn describe(&self) -> &'static str {
        "Processes pending queue entries in bounded batches"
    }

    async fn execute(&self, ctx: &JobContext) -> Result<TaskOutcome, EngineError> {
        let enabled = ctx
            .settings
            .get_setting(QUEUE_ENABLED_SETTING)
            .await?
            .map(|value| value != "0")
            .unwrap_or(true);
        if !enabled && self.runner.pending().await? == 0 {
            return Ok(TaskOutcome::Disable(
                "queue processing is off and the backlog is empty".to_string(),
            ));
        }

        let report = self.runner.run_cycle(ctx.cutoff).await?;
        if report.processed() == 0 && report.failed() == 0 {
            return Ok(TaskOutcome::Quiet);
        }

        Ok(TaskOutcome::Logged(format!(
            "advanced {} batch(es), drained {} entr{}, {} failure(s){}",
            report.advanced(),
            report.drained(),
            if report.drained() == 1 { "y" } else { "ies" },
            report.failed(),
            if report.hit_cutoff {
                ", stopped at cutoff"
            } else {
                ""
            }
        )))
    }
}
