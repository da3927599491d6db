// Progress Reporter Port
// Per-item diagnostics for a stage. Pure observability: has no effect on
// what the worker does with the item.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Point in an item's life a progress event was taken at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    /// The stage function is about to run
    Running,
    /// The stage function returned (or failed) and the result was routed
    Done,
}

/// Snapshot of a worker's queues around one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub stage: String,
    pub worker: usize,
    pub input_label: String,
    pub input_len: usize,
    /// `(label, len)` of the output queue, `None` for terminal stages
    pub output: Option<(String, usize)>,
}

impl ProgressEvent {
    /// Plain-text line intended for console output
    pub fn line(&self) -> String {
        match (self.phase, &self.output) {
            (ProgressPhase::Running, _) => format!("stage: {}, running", self.stage),
            (ProgressPhase::Done, Some((label, len))) => format!(
                "stage: {} | {}: {} | {}: {}, done.",
                self.stage, self.input_label, self.input_len, label, len
            ),
            (ProgressPhase::Done, None) => format!(
                "stage: {} | {}: {}, done.",
                self.stage, self.input_label, self.input_len
            ),
        }
    }
}

/// Sink for progress events
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Writes one line per event, to stderr unless told otherwise
///
/// stdout is left alone so a stage can stream its own records there.
pub struct ConsoleReporter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleReporter {
    pub fn stderr() -> Self {
        Self::with_writer(io::stderr())
    }

    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::stderr()
    }
}

impl ProgressReporter for ConsoleReporter {
    fn report(&self, event: &ProgressEvent) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "{}", event.line()) {
            warn!(stage = %event.stage, error = %e, "Failed to write progress line");
        }
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Reporter that keeps every event in memory
    #[derive(Default)]
    pub struct RecordingReporter {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl RecordingReporter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<ProgressEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressReporter for RecordingReporter {
        fn report(&self, event: &ProgressEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn event(phase: ProgressPhase, output: Option<(String, usize)>) -> ProgressEvent {
        ProgressEvent {
            phase,
            stage: "video_check".to_string(),
            worker: 0,
            input_label: "video_obj_queue".to_string(),
            input_len: 3,
            output,
        }
    }

    #[test]
    fn test_line_with_output_queue() {
        let line = event(ProgressPhase::Done, Some(("video_save_queue".to_string(), 1))).line();
        assert_eq!(
            line,
            "stage: video_check | video_obj_queue: 3 | video_save_queue: 1, done."
        );
    }

    #[test]
    fn test_line_for_terminal_stage() {
        assert_eq!(
            event(ProgressPhase::Done, None).line(),
            "stage: video_check | video_obj_queue: 3, done."
        );
    }

    #[test]
    fn test_line_before_running() {
        let line = event(ProgressPhase::Running, Some(("video_save_queue".to_string(), 1))).line();
        assert_eq!(line, "stage: video_check, running");
    }

    #[test]
    fn test_console_reporter_writes_lines_to_its_writer() {
        let buffer = SharedBuffer::default();
        let reporter = ConsoleReporter::with_writer(buffer.clone());

        reporter.report(&event(ProgressPhase::Running, None));
        reporter.report(&event(ProgressPhase::Done, None));

        let written = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(
            written,
            "stage: video_check, running\nstage: video_check | video_obj_queue: 3, done.\n"
        );
    }
}
