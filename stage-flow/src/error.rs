use thiserror::Error;

/// Errors raised while stepping a conversation through its stages
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),

    #[error("No task registered for stage: {0}")]
    TaskNotFound(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;
