use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use queuenator_models::core::{NewQueueEntry, QueueEntry, Task, TaskRun};
use uuid::Uuid;

use crate::interfaces::{QueueStore, SettingsStore, TaskStore};
use crate::StoreError;

#[derive(Default)]
struct StoreState {
    entries: Vec<QueueEntry>,
    next_entry_id: i64,
    tasks: Vec<Task>,
    next_task_id: i64,
    runs: Vec<TaskRun>,
    next_run_id: i64,
    settings: HashMap<String, String>,
}

/// In-memory store for tests and embedders that do not need durability.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lease_free(entry: &QueueEntry, now: DateTime<Utc>) -> bool {
    match entry.claimed_until {
        Some(until) => until <= now,
        None => true,
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn insert(&self, entry: NewQueueEntry) -> Result<i64, StoreError> {
        let mut guard = self.state.lock();
        guard.next_entry_id += 1;
        let id = guard.next_entry_id;
        guard.entries.push(QueueEntry {
            id,
            app: entry.app,
            key: entry.key,
            data: entry.data,
            offset: 0,
            priority: entry.priority,
            enqueued_at: Utc::now(),
            claimed_until: None,
            claimed_by: None,
        });
        Ok(id)
    }

    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<QueueEntry>, StoreError> {
        let guard = self.state.lock();
        let mut due: Vec<QueueEntry> = guard
            .entries
            .iter()
            .filter(|entry| lease_free(entry, now))
            .cloned()
            .collect();
        due.sort_by_key(|entry| (entry.priority, entry.enqueued_at, entry.id));
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn claim(
        &self,
        id: i64,
        owner: Uuid,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut guard = self.state.lock();
        let entry = guard
            .entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(StoreError::EntryNotFound(id))?;
        if !lease_free(entry, now) {
            return Ok(false);
        }
        entry.claimed_until = Some(until);
        entry.claimed_by = Some(owner);
        Ok(true)
    }

    async fn release(&self, id: i64, owner: Uuid) -> Result<(), StoreError> {
        let mut guard = self.state.lock();
        if let Some(entry) = guard
            .entries
            .iter_mut()
            .find(|entry| entry.id == id && entry.claimed_by == Some(owner))
        {
            entry.claimed_until = None;
            entry.claimed_by = None;
        }
        Ok(())
    }

    async fn update_offset(&self, id: i64, offset: i64) -> Result<(), StoreError> {
        let mut guard = self.state.lock();
        let entry = guard
            .entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(StoreError::EntryNotFound(id))?;
        if offset < entry.offset {
            return Err(StoreError::OffsetRegression {
                id,
                current: entry.offset,
                requested: offset,
            });
        }
        entry.offset = offset;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut guard = self.state.lock();
        guard.entries.retain(|entry| entry.id != id);
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Option<QueueEntry>, StoreError> {
        let guard = self.state.lock();
        Ok(guard.entries.iter().find(|entry| entry.id == id).cloned())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.state.lock().entries.len() as u64)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn upsert_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut guard = self.state.lock();
        if let Some(existing) = guard.tasks.iter_mut().find(|t| t.key == task.key) {
            existing.schedule = task.schedule.clone();
            return Ok(());
        }
        guard.next_task_id += 1;
        let id = guard.next_task_id;
        let mut task = task.clone();
        task.id = Some(id);
        guard.tasks.push(task);
        Ok(())
    }

    async fn fetch_all_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.state.lock().tasks.clone())
    }

    async fn update_task_execution(
        &self,
        key: &str,
        last_run: Option<DateTime<Utc>>,
        next_execution: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut guard = self.state.lock();
        let task = guard
            .tasks
            .iter_mut()
            .find(|t| t.key == key)
            .ok_or_else(|| StoreError::TaskNotFound(key.to_string()))?;
        if last_run.is_some() {
            task.last_run = last_run;
        }
        task.next_execution = next_execution;
        Ok(())
    }

    async fn set_task_enabled(&self, key: &str, enabled: bool) -> Result<(), StoreError> {
        let mut guard = self.state.lock();
        let task = guard
            .tasks
            .iter_mut()
            .find(|t| t.key == key)
            .ok_or_else(|| StoreError::TaskNotFound(key.to_string()))?;
        task.enabled = enabled;
        Ok(())
    }

    async fn log_task_run(
        &self,
        task_key: &str,
        start_time: DateTime<Utc>,
        duration_ms: i64,
        success: bool,
        message: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut guard = self.state.lock();
        guard.next_run_id += 1;
        let id = guard.next_run_id;
        guard.runs.push(TaskRun {
            id,
            task_key: task_key.to_string(),
            start_time: start_time.timestamp(),
            duration_ms,
            success,
            message: message.map(str::to_string),
        });
        Ok(())
    }

    async fn fetch_task_runs(&self, start: i64, end: i64) -> Result<Vec<TaskRun>, StoreError> {
        let guard = self.state.lock();
        Ok(guard
            .runs
            .iter()
            .filter(|run| run.start_time >= start && run.start_time <= end)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_setting(&self, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self.state.lock().settings.get(name).cloned())
    }

    async fn set_setting(&self, name: &str, value: &str) -> Result<(), StoreError> {
        self.state
            .lock()
            .settings
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn claim_is_compare_and_swap() {
        let store = MemoryStore::new();
        let id = store
            .insert(NewQueueEntry::new("core", "rebuild", json!({})))
            .await
            .unwrap();

        let now = Utc::now();
        let until = now + chrono::Duration::seconds(60);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(store.claim(id, first, until, now).await.unwrap());
        assert!(!store.claim(id, second, until, now).await.unwrap());

        let after_lease = until + chrono::Duration::seconds(1);
        assert!(store
            .claim(id, second, after_lease + chrono::Duration::seconds(60), after_lease)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn claimed_entries_are_not_due() {
        let store = MemoryStore::new();
        let id = store
            .insert(NewQueueEntry::new("core", "rebuild", json!({})))
            .await
            .unwrap();

        let now = Utc::now();
        store
            .claim(id, Uuid::new_v4(), now + chrono::Duration::seconds(60), now)
            .await
            .unwrap();

        assert!(store.fetch_due(now, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn offset_is_monotonic() {
        let store = MemoryStore::new();
        let id = store
            .insert(NewQueueEntry::new("core", "rebuild", json!({})))
            .await
            .unwrap();

        store.update_offset(id, 10).await.unwrap();
        assert!(matches!(
            store.update_offset(id, 3).await.unwrap_err(),
            StoreError::OffsetRegression { .. }
        ));
    }

    #[tokio::test]
    async fn upsert_keeps_runtime_task_state() {
        let store = MemoryStore::new();
        let task = Task::new(
            "queue.run",
            queuenator_models::core::TaskSchedule::Interval(60),
        );
        store.upsert_task(&task).await.unwrap();
        store.set_task_enabled("queue.run", false).await.unwrap();

        // Re-seeding at boot must not undo an operator's disable.
        store.upsert_task(&task).await.unwrap();
        let tasks = store.fetch_all_tasks().await.unwrap();
        assert!(!tasks[0].enabled);
    }
}
