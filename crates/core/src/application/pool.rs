// Worker Pool - one stage of a pipeline

use crate::application::worker::constants::DEFAULT_WORKER_COUNT;
use crate::application::worker::{shutdown_with, spawn_with, UnitHandle};
use crate::domain::{SignalQueue, StageConfig, StageReport};
use crate::error::Result;
use crate::port::{ConsoleReporter, ProgressReporter, Stage, SystemTimeProvider, TimeProvider};
use std::sync::Arc;

/// Fixed-size group of worker units sharing one stage, one input queue and
/// at most one output queue
///
/// Lives from spawn until [`shutdown`](WorkerPool::shutdown) returns.
pub struct WorkerPool<T, U> {
    config: Arc<StageConfig>,
    input: Arc<SignalQueue<T>>,
    output: Option<Arc<SignalQueue<U>>>,
    units: Vec<UnitHandle>,
    time_provider: Arc<dyn TimeProvider>,
}

impl WorkerPool<(), ()> {
    /// Start configuring a pool
    ///
    /// # Example
    /// ```text
    /// let pool = WorkerPool::builder(StageConfig::new("parse"))
    ///     .workers(4)
    ///     .spawn(parse_line, input, Some(parsed))?;
    /// ```
    pub fn builder(config: StageConfig) -> PoolBuilder {
        PoolBuilder::new(config)
    }
}

impl<T, U> WorkerPool<T, U> {
    pub fn name(&self) -> &str {
        &self.config.stage_name
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Queue the units consume from
    pub fn input(&self) -> &Arc<SignalQueue<T>> {
        &self.input
    }

    /// Queue non-empty results are forwarded to, if any
    pub fn output(&self) -> Option<&Arc<SignalQueue<U>>> {
        self.output.as_ref()
    }

    /// Number of units in the pool
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[UnitHandle] {
        &self.units
    }

    /// Run the close/join/wait protocol on this pool's input queue
    pub fn shutdown(self) -> Result<StageReport> {
        shutdown_with(&self.input, self.units, self.time_provider.as_ref())
    }
}

/// Builder for [`WorkerPool`]
pub struct PoolBuilder {
    config: StageConfig,
    workers: usize,
    reporter: Arc<dyn ProgressReporter>,
    time_provider: Arc<dyn TimeProvider>,
}

impl PoolBuilder {
    pub fn new(config: StageConfig) -> Self {
        Self {
            config,
            workers: DEFAULT_WORKER_COUNT,
            reporter: Arc::new(ConsoleReporter::stderr()),
            time_provider: Arc::new(SystemTimeProvider),
        }
    }

    pub fn workers(mut self, count: usize) -> Self {
        self.workers = count;
        self
    }

    /// Enable or disable per-item progress lines
    pub fn diagnostics(mut self, enabled: bool) -> Self {
        self.config.diagnostics = enabled;
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = time_provider;
        self
    }

    /// Start the units
    ///
    /// # Errors
    /// - PipelineError::InvalidWorkerCount if `workers(0)` was set
    /// - PipelineError::Spawn if a thread cannot be created
    pub fn spawn<S, T>(
        self,
        stage: S,
        input: Arc<SignalQueue<T>>,
        output: Option<Arc<SignalQueue<S::Output>>>,
    ) -> Result<WorkerPool<T, S::Output>>
    where
        S: Stage<T> + 'static,
        T: Send + 'static,
        S::Output: Send + 'static,
    {
        let config = Arc::new(self.config);
        let units = spawn_with(
            self.workers,
            Arc::new(stage),
            Arc::clone(&input),
            output.clone(),
            Arc::clone(&config),
            self.reporter,
            self.time_provider.as_ref(),
        )?;

        Ok(WorkerPool {
            config,
            input,
            output,
            units,
            time_provider: self.time_provider,
        })
    }
}
