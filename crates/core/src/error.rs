// Central Error Type for the pipeline primitives

use thiserror::Error;

/// Pipeline-level error type
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid queue capacity: {0} (must be at least 1)")]
    InvalidCapacity(usize),

    #[error("Invalid worker count for stage '{stage}': {count} (must be at least 1)")]
    InvalidWorkerCount { stage: String, count: usize },

    #[error("Queue disconnected: {0}")]
    QueueDisconnected(String),

    #[error("task_done() called more times than entries were enqueued")]
    TaskDoneOverflow,

    #[error("Failed to spawn worker thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker {worker} of stage '{stage}' panicked: {message}")]
    WorkerPanicked {
        stage: String,
        worker: usize,
        message: String,
    },
}

/// Result type alias using PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;
