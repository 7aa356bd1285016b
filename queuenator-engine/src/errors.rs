use queuenator_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("handler {app}/{key} failed: {message}")]
    Handler {
        app: String,
        key: String,
        message: String,
    },
    #[error("invalid schedule: {0}")]
    Schedule(String),
}

impl EngineError {
    pub fn handler(
        app: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        EngineError::Handler {
            app: app.into(),
            key: key.into(),
            message: message.into(),
        }
    }
}
