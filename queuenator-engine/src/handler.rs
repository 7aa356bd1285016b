use async_trait::async_trait;
use queuenator_models::core::Progress;
use serde_json::Value;

use crate::EngineError;

/// What one invocation of a queue handler did.
///
/// Completion is a variant, not an error: a handler that finds no row at or
/// beyond the given offset returns `Done` and the entry is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// More work remains; resume at this offset next cycle. The new offset is
    /// the old one plus the number of records actually processed.
    Processed(i64),
    /// No further work exists at the current offset.
    Done,
}

/// A background work handler, resolved by `(app, key)` from the registry.
///
/// Recoverable per-record failures must be handled (and logged) inside
/// `run`; only genuinely unexpected conditions should surface as an error,
/// which aborts the cycle for this entry and retries from the last persisted
/// offset on the next run.
#[async_trait]
pub trait QueueHandler: Send + Sync {
    async fn run(&self, data: &Value, offset: i64) -> Result<Step, EngineError>;

    /// Progress snapshot for polling surfaces.
    fn progress(&self, _data: &Value, offset: i64) -> Progress {
        Progress::new(format!("Processing (offset {offset})"), None)
    }

    /// Normalize parameters before first enqueue. Returning `None` means
    /// there is nothing to do and no entry is created.
    fn pre_queue(&self, data: Value) -> Option<Value> {
        Some(data)
    }
}
