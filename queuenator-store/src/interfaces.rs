use async_trait::async_trait;
use chrono::{DateTime, Utc};
use queuenator_models::core::{NewQueueEntry, QueueEntry, Task, TaskRun};
use uuid::Uuid;

use crate::StoreError;

/// Durable queue of deferred work. Implementations must keep offsets
/// monotonically non-decreasing and honor the claim lease so that an entry is
/// dispatched by at most one runner at a time.
#[async_trait]
pub trait QueueStore: Send + Sync + 'static {
    async fn insert(&self, entry: NewQueueEntry) -> Result<i64, StoreError>;

    /// Entries whose lease is free or expired at `now`, ordered by priority
    /// (lowest number first) then enqueue time.
    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<QueueEntry>, StoreError>;

    /// Compare-and-swap lease acquisition. Returns `Ok(true)` when the lease
    /// was acquired, `Ok(false)` when another runner holds an unexpired lease.
    async fn claim(
        &self,
        id: i64,
        owner: Uuid,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Release a lease held by `owner`. Releasing an entry claimed by someone
    /// else is a no-op.
    async fn release(&self, id: i64, owner: Uuid) -> Result<(), StoreError>;

    async fn update_offset(&self, id: i64, offset: i64) -> Result<(), StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    async fn get(&self, id: i64) -> Result<Option<QueueEntry>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    async fn upsert_task(&self, task: &Task) -> Result<(), StoreError>;

    async fn fetch_all_tasks(&self) -> Result<Vec<Task>, StoreError>;

    async fn update_task_execution(
        &self,
        key: &str,
        last_run: Option<DateTime<Utc>>,
        next_execution: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    async fn set_task_enabled(&self, key: &str, enabled: bool) -> Result<(), StoreError>;

    async fn log_task_run(
        &self,
        task_key: &str,
        start_time: DateTime<Utc>,
        duration_ms: i64,
        success: bool,
        message: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn fetch_task_runs(&self, start: i64, end: i64) -> Result<Vec<TaskRun>, StoreError>;
}

/// Named configuration flags, e.g. for a task to disable itself.
#[async_trait]
pub trait SettingsStore: Send + Sync + 'static {
    async fn get_setting(&self, name: &str) -> Result<Option<String>, StoreError>;

    async fn set_setting(&self, name: &str, value: &str) -> Result<(), StoreError>;
}
