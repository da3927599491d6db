// Port Layer - Interfaces the worker pool calls out to

pub mod progress;
pub mod stage;
pub mod time_provider;

// Re-exports
pub use progress::{ConsoleReporter, ProgressEvent, ProgressPhase, ProgressReporter};
pub use stage::{fallible, Fallible, Stage, StageError};
pub use time_provider::{SystemTimeProvider, TimeProvider};
