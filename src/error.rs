use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Resource {resource} is locked by {holder} until {expires_at}")]
    Contention {
        resource: String,
        holder: String,
        expires_at: DateTime<Utc>,
    },

    #[error("Lock store for {resource} is busy")]
    LockBusy { resource: String },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Worker not found: {0}")]
    WorkerNotFound(String),

    #[error("Worker {worker} is already assigned to task {task}")]
    WorkerOccupied { worker: String, task: String },

    #[error("Task {task} is {actual}, expected {expected}")]
    Precondition {
        task: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid stage transition from {from} to {to}")]
    InvalidStageTransition { from: String, to: String },

    #[error("Pipeline has no requirements document; record one first")]
    NoPrd,
}

pub type Result<T> = std::result::Result<T, Error>;
