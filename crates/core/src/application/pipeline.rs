// Pipeline - ordered chain of stages shut down front to back

use crate::application::pool::WorkerPool;
use crate::domain::{PipelineReport, StageReport};
use crate::error::Result;
use tracing::{error, info};

/// Type-erased stage lifecycle, so pools with different item types can sit
/// in one pipeline
pub trait StageLifecycle: Send {
    fn stage_name(&self) -> &str;

    /// Close, drain and wait for every unit of the stage
    fn shutdown(self: Box<Self>) -> Result<StageReport>;
}

impl<T, U> StageLifecycle for WorkerPool<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    fn stage_name(&self) -> &str {
        self.name()
    }

    fn shutdown(self: Box<Self>) -> Result<StageReport> {
        WorkerPool::shutdown(*self)
    }
}

/// Stages in data-flow order
///
/// Stage N's output queue is expected to be stage N+1's input queue. The
/// pipeline does not check this; it only fixes the shutdown order so each
/// stage is fully drained before its consumers are closed.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn StageLifecycle>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage downstream of the current last one
    pub fn push(&mut self, stage: impl StageLifecycle + 'static) -> &mut Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Builder-style [`push`](Pipeline::push)
    pub fn then(mut self, stage: impl StageLifecycle + 'static) -> Self {
        self.push(stage);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.stage_name()).collect()
    }

    /// Shut every stage down in order
    ///
    /// A failing stage does not stop the remaining ones from being shut
    /// down; the first error is returned once all stages are done.
    pub fn shutdown(self) -> Result<PipelineReport> {
        info!(stages = self.stages.len(), "Shutting down pipeline");

        let mut report = PipelineReport::default();
        let mut first_error = None;
        for stage in self.stages {
            let name = stage.stage_name().to_string();
            match stage.shutdown() {
                Ok(stage_report) => report.stages.push(stage_report),
                Err(e) => {
                    error!(stage = %name, error = %e, "Stage shutdown failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(failed = report.failed(), "Pipeline drained");
                Ok(report)
            }
        }
    }
}
