use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use queuenator_engine::{Clock, Cutoff, EngineError};
use queuenator_models::core::TaskOutcome;
use queuenator_store::SettingsStore;

/// Everything a job gets for one run: the clock, the cutoff for this cycle
/// and the settings store (so a job can inspect, or flip, its own flags).
pub struct JobContext {
    pub clock: Arc<dyn Clock>,
    pub cutoff: Cutoff,
    pub settings: Arc<dyn SettingsStore>,
}

/// A named unit of scheduled work, resolved from the [`JobRegistry`] by the
/// task's key.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn key(&self) -> &'static str;

    fn describe(&self) -> &'static str {
        ""
    }

    async fn execute(&self, ctx: &JobContext) -> Result<TaskOutcome, EngineError>;
}

/// Startup-time table of scheduled jobs, keyed by task key.
#[derive(Default)]
pub struct JobRegistry {
    jobs: HashMap<&'static str, Arc<dyn ScheduledJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job: Arc<dyn ScheduledJob>) {
        self.jobs.insert(job.key(), job);
    }

    pub fn resolve(&self, key: &str) -> Option<Arc<dyn ScheduledJob>> {
        self.jobs.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
