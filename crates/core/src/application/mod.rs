// Application Layer - Worker units, pools and pipelines

pub mod pipeline;
pub mod pool;
pub mod worker;

// Re-exports
pub use pipeline::{Pipeline, StageLifecycle};
pub use pool::{PoolBuilder, WorkerPool};
pub use worker::{shutdown, spawn, UnitHandle, WorkerUnit};
