use chrono::{DateTime, Utc};
use queuenator_models::core::{QueueEntry, Task, TaskRun, TaskSchedule};
use sqlx::{Row, sqlite::SqliteRow};
use uuid::Uuid;

use crate::StoreError;

pub fn row_to_queue_entry(row: &SqliteRow) -> Result<QueueEntry, StoreError> {
    let data = serde_json::from_str(&row.get::<String, _>("data"))?;
    let claimed_until = row
        .get::<Option<i64>, _>("claimed_until")
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));
    let claimed_by = row
        .get::<Option<String>, _>("claimed_by")
        .and_then(|raw| Uuid::parse_str(&raw).ok());

    Ok(QueueEntry {
        id: row.get::<i64, _>("id"),
        app: row.get::<String, _>("app"),
        key: row.get::<String, _>("key"),
        data,
        offset: row.get::<i64, _>("resume_offset"),
        priority: row.get::<i64, _>("priority"),
        enqueued_at: DateTime::<Utc>::from_timestamp(row.get::<i64, _>("enqueued_at"), 0)
            .unwrap_or_default(),
        claimed_until,
        claimed_by,
    })
}

pub fn row_to_task(row: &SqliteRow) -> Task {
    let schedule = match row.get::<Option<String>, _>("cron_schedule") {
        Some(expr) => TaskSchedule::Cron(expr),
        None => TaskSchedule::Interval(row.get::<Option<i64>, _>("interval_seconds").unwrap_or(0)),
    };

    Task {
        id: row.get::<Option<i64>, _>("id"),
        key: row.get::<String, _>("key"),
        schedule,
        enabled: row.get::<bool, _>("enabled"),
        last_run: row
            .get::<Option<i64>, _>("last_run")
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        next_execution: row
            .get::<Option<i64>, _>("next_execution")
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
    }
}

pub fn row_to_task_run(row: &SqliteRow) -> TaskRun {
    TaskRun {
        id: row.get::<i64, _>("id"),
        task_key: row.get::<String, _>("task_key"),
        start_time: row.get::<i64, _>("start_time"),
        duration_ms: row.get::<i64, _>("duration_ms"),
        success: row.get::<bool, _>("success"),
        message: row.get::<Option<String>, _>("message"),
    }
}

pub fn schedule_columns(schedule: &TaskSchedule) -> (Option<i64>, Option<String>) {
    match schedule {
        TaskSchedule::Interval(seconds) => (Some(*seconds), None),
        TaskSchedule::Cron(expr) => (None, Some(expr.clone())),
    }
}
