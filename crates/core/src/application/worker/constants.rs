// Worker constants (no magic values)

/// Default bounded capacity for stage queues
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default number of worker units per pool
pub const DEFAULT_WORKER_COUNT: usize = 1;

/// Message used when a panic payload is neither `&str` nor `String`
pub const UNKNOWN_PANIC_MESSAGE: &str = "Unknown panic";
