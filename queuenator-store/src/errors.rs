use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("queue entry not found: {0}")]
    EntryNotFound(i64),
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("offset for entry {id} may not move backwards ({current} -> {requested})")]
    OffsetRegression {
        id: i64,
        current: i64,
        requested: i64,
    },
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
