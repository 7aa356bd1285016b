use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// When a task is due to run again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TaskSchedule {
    /// Fixed delay in seconds between runs.
    Interval(i64),
    /// Cron expression.
    Cron(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Option<i64>,
    pub key: String,
    pub schedule: TaskSchedule,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_execution: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(key: impl Into<String>, schedule: TaskSchedule) -> Self {
        Self {
            id: None,
            key: key.into(),
            schedule,
            enabled: true,
            last_run: None,
            next_execution: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.next_execution {
            Some(next) => self.enabled && next <= now,
            None => false,
        }
    }
}

/// A persisted unit of deferred work. The offset is the resume position into
/// whatever datasource the handler walks; it never moves backwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: i64,
    pub app: String,
    pub key: String,
    pub data: Value,
    pub offset: i64,
    pub priority: i64,
    pub enqueued_at: DateTime<Utc>,
    pub claimed_until: Option<DateTime<Utc>>,
    pub claimed_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQueueEntry {
    pub app: String,
    pub key: String,
    pub data: Value,
    pub priority: i64,
}

impl NewQueueEntry {
    pub fn new(app: impl Into<String>, key: impl Into<String>, data: Value) -> Self {
        Self {
            app: app.into(),
            key: key.into(),
            data,
            priority: 5,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRun {
    pub id: i64,
    pub task_key: String,
    pub start_time: i64,
    pub duration_ms: i64,
    pub success: bool,
    pub message: Option<String>,
}

/// Snapshot of a queue entry's progress, for polling surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub text: String,
    pub percent: Option<u8>,
}

impl Progress {
    pub fn new(text: impl Into<String>, percent: Option<u8>) -> Self {
        Self {
            text: text.into(),
            percent,
        }
    }
}

/// What a scheduled task reports after a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Ran, nothing worth logging.
    Quiet,
    /// Ran, record this message in the run log.
    Logged(String),
    /// Precondition is permanently false; the runner flips the enabled flag.
    Disable(String),
}
