// Worker - per-thread consumption loop

pub mod constants;
mod panic_guard;
mod shutdown;

pub use panic_guard::{execute_guarded, panic_message, PanicGuardResult};
pub use shutdown::shutdown;
pub(crate) use shutdown::shutdown_with;

use crate::domain::{SignalQueue, StageConfig, UnitReport};
use crate::error::{PipelineError, Result};
use crate::port::{
    ConsoleReporter, ProgressEvent, ProgressPhase, ProgressReporter, Stage, StageError,
    SystemTimeProvider, TimeProvider,
};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// One logical thread bound to an input queue, a stage and an optional
/// output queue
///
/// Lifecycle: idle while blocked on its input, running while the stage
/// processes an item, terminated once it consumes its shutdown marker.
/// A terminated unit is not restarted.
pub struct WorkerUnit<S, T>
where
    S: Stage<T>,
{
    index: usize,
    config: Arc<StageConfig>,
    stage: Arc<S>,
    input: Arc<SignalQueue<T>>,
    output: Option<Arc<SignalQueue<S::Output>>>,
    reporter: Arc<dyn ProgressReporter>,
}

impl<S, T> WorkerUnit<S, T>
where
    S: Stage<T>,
{
    pub fn new(
        index: usize,
        config: Arc<StageConfig>,
        stage: Arc<S>,
        input: Arc<SignalQueue<T>>,
        output: Option<Arc<SignalQueue<S::Output>>>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            index,
            config,
            stage,
            input,
            output,
            reporter,
        }
    }

    /// Consume the input queue until this unit's shutdown marker arrives
    ///
    /// Stage errors and panics are logged and counted; the unit keeps going
    /// and the item is still marked done.
    pub fn run(&self) -> UnitReport {
        let stage = self.config.stage_name.as_str();
        info!(stage, worker = self.index, "Worker started");

        let mut report = UnitReport::new(self.index);
        for item in self.input.consume() {
            report.processed += 1;
            if self.config.diagnostics {
                self.report_progress(ProgressPhase::Running);
            }

            match execute_guarded(AssertUnwindSafe(|| self.stage.process(item))) {
                PanicGuardResult::Success(Ok(Some(result))) => self.forward(result, &mut report),
                PanicGuardResult::Success(Ok(None)) => report.dropped += 1,
                PanicGuardResult::Success(Err(e)) => self.record_failure(e, &mut report),
                PanicGuardResult::Panicked(msg) => {
                    self.record_failure(StageError::Panicked(msg), &mut report)
                }
            }

            if self.config.diagnostics {
                self.report_progress(ProgressPhase::Done);
            }
        }

        info!(
            stage,
            worker = self.index,
            processed = report.processed,
            forwarded = report.forwarded,
            failed = report.failures.len(),
            "Worker stopped"
        );
        report
    }

    fn forward(&self, result: S::Output, report: &mut UnitReport) {
        let Some(output) = &self.output else {
            // Terminal stage
            report.dropped += 1;
            return;
        };

        match output.enqueue(result) {
            Ok(()) => {
                report.forwarded += 1;
                debug!(
                    stage = %self.config.stage_name,
                    worker = self.index,
                    output = %self.config.output_label,
                    "Forwarded result"
                );
            }
            Err(e) => {
                error!(
                    stage = %self.config.stage_name,
                    worker = self.index,
                    error = %e,
                    "Failed to forward result"
                );
                report.failures.push(e.to_string());
            }
        }
    }

    fn record_failure(&self, e: StageError, report: &mut UnitReport) {
        error!(
            stage = %self.config.stage_name,
            worker = self.index,
            error = %e,
            "Stage function failed"
        );
        report.failures.push(e.to_string());
    }

    fn report_progress(&self, phase: ProgressPhase) {
        let event = ProgressEvent {
            phase,
            stage: self.config.stage_name.clone(),
            worker: self.index,
            input_label: self.config.input_label.clone(),
            input_len: self.input.len(),
            output: self
                .output
                .as_ref()
                .map(|q| (self.config.output_label.clone(), q.len())),
        };

        let reporter = &self.reporter;
        if let PanicGuardResult::Panicked(msg) =
            execute_guarded(AssertUnwindSafe(|| reporter.report(&event)))
        {
            warn!(stage = %event.stage, worker = self.index, panic_msg = %msg, "Progress reporter panicked");
        }
    }
}

impl<S, T> WorkerUnit<S, T>
where
    S: Stage<T> + 'static,
    T: Send + 'static,
    S::Output: Send + 'static,
{
    /// Start the unit on its own named OS thread
    pub fn start(self, started_at_ms: i64) -> Result<UnitHandle> {
        let name = self.config.worker_name(self.index);
        let stage = self.config.stage_name.clone();
        let index = self.index;

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run())
            .map_err(|source| PipelineError::Spawn {
                name: name.clone(),
                source,
            })?;

        Ok(UnitHandle {
            index,
            name,
            stage,
            started_at_ms,
            handle,
        })
    }
}

/// Handle to a started worker unit
#[derive(Debug)]
pub struct UnitHandle {
    index: usize,
    name: String,
    stage: String,
    started_at_ms: i64,
    handle: JoinHandle<UnitReport>,
}

impl UnitHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Thread name, `<stage>-<index>`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn started_at_ms(&self) -> i64 {
        self.started_at_ms
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the unit's thread terminates
    ///
    /// # Errors
    /// - PipelineError::WorkerPanicked if the thread died instead of returning
    pub fn wait(self) -> Result<UnitReport> {
        self.handle
            .join()
            .map_err(|payload| PipelineError::WorkerPanicked {
                stage: self.stage,
                worker: self.index,
                message: panic_message(payload.as_ref()),
            })
    }
}

/// Start `count` units sharing one stage, input queue and output queue
///
/// Per-item diagnostics, when enabled in `config`, go to stdout.
///
/// # Errors
/// - PipelineError::InvalidWorkerCount if `count` is zero
/// - PipelineError::Spawn if a thread cannot be created; units already
///   started are shut down before returning
pub fn spawn<S, T>(
    count: usize,
    stage: Arc<S>,
    input: Arc<SignalQueue<T>>,
    output: Option<Arc<SignalQueue<S::Output>>>,
    config: StageConfig,
) -> Result<Vec<UnitHandle>>
where
    S: Stage<T> + 'static,
    T: Send + 'static,
    S::Output: Send + 'static,
{
    spawn_with(
        count,
        stage,
        input,
        output,
        Arc::new(config),
        Arc::new(ConsoleReporter::stderr()),
        &SystemTimeProvider,
    )
}

pub(crate) fn spawn_with<S, T>(
    count: usize,
    stage: Arc<S>,
    input: Arc<SignalQueue<T>>,
    output: Option<Arc<SignalQueue<S::Output>>>,
    config: Arc<StageConfig>,
    reporter: Arc<dyn ProgressReporter>,
    time_provider: &dyn TimeProvider,
) -> Result<Vec<UnitHandle>>
where
    S: Stage<T> + 'static,
    T: Send + 'static,
    S::Output: Send + 'static,
{
    if count == 0 {
        return Err(PipelineError::InvalidWorkerCount {
            stage: config.stage_name.clone(),
            count,
        });
    }

    let started_at_ms = time_provider.now_millis();
    let mut units = Vec::with_capacity(count);
    for index in 0..count {
        let unit = WorkerUnit::new(
            index,
            Arc::clone(&config),
            Arc::clone(&stage),
            Arc::clone(&input),
            output.clone(),
            Arc::clone(&reporter),
        );

        match unit.start(started_at_ms) {
            Ok(handle) => units.push(handle),
            Err(e) => {
                error!(stage = %config.stage_name, error = %e, started = units.len(), "Worker spawn failed, retiring started units");
                if let Err(shutdown_err) = shutdown_with(&input, units, time_provider) {
                    warn!(error = %shutdown_err, "Retiring started units failed");
                }
                return Err(e);
            }
        }
    }

    info!(stage = %config.stage_name, workers = count, "Stage started");
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::progress::mocks::RecordingReporter;
    use crate::port::stage::mocks::RecordingStage;

    fn unit_for<S: Stage<u32>>(
        stage: Arc<S>,
        input: Arc<SignalQueue<u32>>,
        output: Option<Arc<SignalQueue<S::Output>>>,
        config: StageConfig,
        reporter: Arc<dyn ProgressReporter>,
    ) -> WorkerUnit<S, u32> {
        WorkerUnit::new(0, Arc::new(config), stage, input, output, reporter)
    }

    #[test]
    fn test_run_forwards_non_empty_results() {
        let input = Arc::new(SignalQueue::new(8).unwrap());
        let output = Arc::new(SignalQueue::new(8).unwrap());
        let stage = Arc::new(|x: u32| if x % 2 == 0 { Some(x * 10) } else { None });

        for i in 0..4 {
            input.enqueue(i).unwrap();
        }
        input.close().unwrap();

        let unit = unit_for(
            stage,
            Arc::clone(&input),
            Some(Arc::clone(&output)),
            StageConfig::new("even"),
            Arc::new(RecordingReporter::new()),
        );
        let report = unit.run();

        assert_eq!(report.processed, 4);
        assert_eq!(report.forwarded, 2);
        assert_eq!(report.dropped, 2);
        assert!(report.failures.is_empty());
        assert_eq!(output.len(), 2);
        assert_eq!(input.unfinished(), 0);
    }

    #[test]
    fn test_run_without_output_discards_results() {
        let input = Arc::new(SignalQueue::new(4).unwrap());
        let stage = Arc::new(RecordingStage::forwarding());
        input.enqueue(1).unwrap();
        input.close().unwrap();

        let unit = unit_for(
            Arc::clone(&stage),
            Arc::clone(&input),
            None,
            StageConfig::new("sink"),
            Arc::new(RecordingReporter::new()),
        );
        let report = unit.run();

        assert_eq!(report.processed, 1);
        assert_eq!(report.forwarded, 0);
        assert_eq!(report.dropped, 1);
        assert_eq!(stage.call_count(), 1);
    }

    #[test]
    fn test_run_survives_failures_and_panics() {
        let input = Arc::new(SignalQueue::new(4).unwrap());
        input.enqueue(1).unwrap();
        input.enqueue(2).unwrap();
        input.close().unwrap();

        let failing = Arc::new(RecordingStage::failing("bad record"));
        let report = unit_for(
            Arc::clone(&failing),
            Arc::clone(&input),
            None,
            StageConfig::new("fail"),
            Arc::new(RecordingReporter::new()),
        )
        .run();
        assert_eq!(report.processed, 2);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures[0].contains("bad record"));
        assert_eq!(input.unfinished(), 0);

        input.enqueue(3).unwrap();
        input.close().unwrap();
        let panicking = Arc::new(RecordingStage::panicking("exploded"));
        let report = unit_for(
            panicking,
            Arc::clone(&input),
            None,
            StageConfig::new("panic"),
            Arc::new(RecordingReporter::new()),
        )
        .run();
        assert_eq!(report.processed, 1);
        assert_eq!(report.failures, vec!["Stage panicked: exploded".to_string()]);
        assert_eq!(input.unfinished(), 0);
    }

    #[test]
    fn test_diagnostics_toggle() {
        let input = Arc::new(SignalQueue::new(4).unwrap());
        let output = Arc::new(SignalQueue::new(4).unwrap());
        let reporter = Arc::new(RecordingReporter::new());
        let stage = Arc::new(RecordingStage::forwarding());

        input.enqueue(5).unwrap();
        input.close().unwrap();
        unit_for(
            Arc::clone(&stage),
            Arc::clone(&input),
            Some(Arc::clone(&output)),
            StageConfig::new("quiet"),
            reporter.clone(),
        )
        .run();
        assert!(reporter.events().is_empty());

        input.enqueue(6).unwrap();
        input.close().unwrap();
        let config = StageConfig::new("loud")
            .with_input_label("url_queue")
            .with_output_label("video_obj_queue")
            .with_diagnostics(true);
        unit_for(
            stage,
            Arc::clone(&input),
            Some(Arc::clone(&output)),
            config,
            reporter.clone(),
        )
        .run();

        let events = reporter.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].phase, ProgressPhase::Running);
        assert_eq!(events[0].line(), "stage: loud, running");
        assert_eq!(events[1].phase, ProgressPhase::Done);
        assert_eq!(events[1].stage, "loud");
        assert_eq!(events[1].input_label, "url_queue");
        assert_eq!(events[1].output, Some(("video_obj_queue".to_string(), 2)));
    }

    #[test]
    fn test_spawn_rejects_zero_workers() {
        let input = Arc::new(SignalQueue::<u32>::new(1).unwrap());
        let stage = Arc::new(RecordingStage::<u32>::forwarding());
        let result = spawn(0, stage, input, None, StageConfig::new("empty"));
        assert!(matches!(
            result,
            Err(PipelineError::InvalidWorkerCount { count: 0, .. })
        ));
    }

    #[test]
    fn test_spawned_units_are_named() {
        let input = Arc::new(SignalQueue::new(4).unwrap());
        let stage = Arc::new(RecordingStage::<u32>::dropping());
        let units = spawn(2, stage, Arc::clone(&input), None, StageConfig::new("named")).unwrap();

        let names: Vec<&str> = units.iter().map(UnitHandle::name).collect();
        assert_eq!(names, vec!["named-0", "named-1"]);
        assert!(units.iter().all(|u| u.stage() == "named"));

        let report = shutdown(&input, units).unwrap();
        assert_eq!(report.units.len(), 2);
    }
}
