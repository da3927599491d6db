// Domain Layer - Queue, stage configuration and reports

pub mod queue;
pub mod report;
pub mod stage;

// Re-exports
pub use queue::{Consume, QueueMessage, SignalQueue};
pub use report::{PipelineReport, StageReport, UnitReport};
pub use stage::StageConfig;
