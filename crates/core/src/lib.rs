// Stagewise Core - bounded signal queues and worker pools for staged pipelines
// NO configuration loading and NO subscriber setup here; see stagewise-cli

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use application::{shutdown, spawn, Pipeline, WorkerPool};
pub use domain::{QueueMessage, SignalQueue, StageConfig};
pub use error::{PipelineError, Result};
pub use port::{fallible, ConsoleReporter, ProgressReporter, Stage, StageError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
