use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use queuenator_models::core::{NewQueueEntry, QueueEntry, Task, TaskRun};
use sqlx::{
    ConnectOptions, Executor, Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use uuid::Uuid;

use crate::interfaces::{QueueStore, SettingsStore, TaskStore};
use crate::mappers;
use crate::StoreError;

pub struct SqliteStore {
    pub pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(filename: &str) -> Result<Self, StoreError> {
        let mut options = SqliteConnectOptions::new()
            .filename(filename)
            .create_if_missing(true);
        options
            .log_statements(log::LevelFilter::Debug)
            .log_slow_statements(log::LevelFilter::Warn, Duration::from_secs(1));
        let pool = SqlitePool::connect_with(options).await?;
        Ok(SqliteStore { pool })
    }

    /// Private in-memory database, single connection so every query sees the
    /// same database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().filename(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(SqliteStore { pool })
    }

    pub async fn create_tables(&self) -> Result<(), StoreError> {
        self.pool
            .execute(
                "CREATE TABLE IF NOT EXISTS queue_entries (
                id INTEGER PRIMARY KEY,
                app TEXT NOT NULL,
                key TEXT NOT NULL,
                data TEXT NOT NULL,
                resume_offset INTEGER NOT NULL DEFAULT 0,
                priority INTEGER NOT NULL DEFAULT 5,
                enqueued_at INTEGER NOT NULL,
                claimed_until INTEGER,
                claimed_by TEXT
            )",
            )
            .await?;
        self.pool
            .execute(
                "CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY,
                key TEXT NOT NULL UNIQUE,
                interval_seconds INTEGER,
                cron_schedule TEXT,
                enabled INTEGER NOT NULL DEFAULT 1,
                last_run INTEGER,
                next_execution INTEGER
            )",
            )
            .await?;
        self.pool
            .execute(
                "CREATE TABLE IF NOT EXISTS task_runs (
                id INTEGER PRIMARY KEY,
                task_key TEXT NOT NULL,
                start_time INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL,
                success INTEGER NOT NULL,
                message TEXT
            )",
            )
            .await?;
        self.pool
            .execute(
                "CREATE TABLE IF NOT EXISTS settings (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl QueueStore for SqliteStore {
    async fn insert(&self, entry: NewQueueEntry) -> Result<i64, StoreError> {
        let data = serde_json::to_string(&entry.data)?;
        let result = sqlx::query(
            "INSERT INTO queue_entries (app, key, data, resume_offset, priority, enqueued_at)
             VALUES (?, ?, ?, 0, ?, ?)",
        )
        .bind(&entry.app)
        .bind(&entry.key)
        .bind(data)
        .bind(entry.priority)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<QueueEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, app, key, data, resume_offset, priority, enqueued_at, claimed_until, claimed_by
             FROM queue_entries
             WHERE claimed_until IS NULL OR claimed_until <= ?
             ORDER BY priority ASC, enqueued_at ASC, id ASC
             LIMIT ?",
        )
        .bind(now.timestamp())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(mappers::row_to_queue_entry).collect()
    }

    async fn claim(
        &self,
        id: i64,
        owner: Uuid,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE queue_entries SET claimed_until = ?, claimed_by = ?
             WHERE id = ? AND (claimed_until IS NULL OR claimed_until <= ?)",
        )
        .bind(until.timestamp())
        .bind(owner.to_string())
        .bind(id)
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        match self.get(id).await? {
            Some(_) => Ok(false),
            None => Err(StoreError::EntryNotFound(id)),
        }
    }

    async fn release(&self, id: i64, owner: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE queue_entries SET claimed_until = NULL, claimed_by = NULL
             WHERE id = ? AND claimed_by = ?",
        )
        .bind(id)
        .bind(owner.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_offset(&self, id: i64, offset: i64) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE queue_entries SET resume_offset = ? WHERE id = ? AND resume_offset <= ?")
                .bind(offset)
                .bind(id)
                .bind(offset)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        match self.get(id).await? {
            Some(entry) => Err(StoreError::OffsetRegression {
                id,
                current: entry.offset,
                requested: offset,
            }),
            None => Err(StoreError::EntryNotFound(id)),
        }
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM queue_entries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Option<QueueEntry>, StoreError> {
        let row = sqlx::query(
            "SELECT id, app, key, data, resume_offset, priority, enqueued_at, claimed_until, claimed_by
             FROM queue_entries WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(mappers::row_to_queue_entry).transpose()
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM queue_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("cnt") as u64)
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn upsert_task(&self, task: &Task) -> Result<(), StoreError> {
        let (interval_seconds, cron_schedule) = mappers::schedule_columns(&task.schedule);
        sqlx::query(
            "INSERT INTO tasks (key, interval_seconds, cron_schedule, enabled, last_run, next_execution)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                interval_seconds = excluded.interval_seconds,
                cron_schedule = excluded.cron_schedule",
        )
        .bind(&task.key)
        .bind(interval_seconds)
        .bind(cron_schedule)
        .bind(task.enabled)
        .bind(task.last_run.map(|dt| dt.timestamp()))
        .bind(task.next_execution.map(|dt| dt.timestamp()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_all_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, key, interval_seconds, cron_schedule, enabled, last_run, next_execution FROM tasks",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(mappers::row_to_task).collect())
    }

    async fn update_task_execution(
        &self,
        key: &str,
        last_run: Option<DateTime<Utc>>,
        next_execution: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE tasks SET last_run = COALESCE(?, last_run), next_execution = ? WHERE key = ?",
        )
        .bind(last_run.map(|dt| dt.timestamp()))
        .bind(next_execution.map(|dt| dt.timestamp()))
        .bind(key)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TaskNotFound(key.to_string()));
        }
        Ok(())
    }

    async fn set_task_enabled(&self, key: &str, enabled: bool) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE tasks SET enabled = ? WHERE key = ?")
            .bind(enabled)
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TaskNotFound(key.to_string()));
        }
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
        sqlx::query(
            "INSERT INTO task_runs (task_key, start_time, duration_ms, success, message)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(task_key)
        .bind(start_time.timestamp())
        .bind(duration_ms)
        .bind(success)
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_task_runs(&self, start: i64, end: i64) -> Result<Vec<TaskRun>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, task_key, start_time, duration_ms, success, message
             FROM task_runs WHERE start_time >= ? AND start_time <= ?",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(mappers::row_to_task_run).collect())
    }
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn get_setting(&self, name: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM settings WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    async fn set_setting(&self, name: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO settings (name, value) VALUES (?, ?)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        )
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
