// Stage shutdown protocol: close once per unit, join the queue, wait for
// every unit thread.

use super::UnitHandle;
use crate::domain::{SignalQueue, StageReport};
use crate::error::{PipelineError, Result};
use crate::port::{SystemTimeProvider, TimeProvider};
use tracing::{error, info};

/// Close `input` for every unit, wait for the queue to drain, then wait for
/// every unit thread to exit
///
/// Returns only after all unit threads have terminated. No unit is
/// abandoned mid-item and no shutdown marker is left in the queue, provided
/// `units` are exactly the consumers of `input`.
///
/// # Errors
/// - PipelineError::WorkerPanicked if a unit thread died; the remaining
///   units are still waited for first
pub fn shutdown<T>(input: &SignalQueue<T>, units: Vec<UnitHandle>) -> Result<StageReport> {
    shutdown_with(input, units, &SystemTimeProvider)
}

pub(crate) fn shutdown_with<T>(
    input: &SignalQueue<T>,
    units: Vec<UnitHandle>,
    time_provider: &dyn TimeProvider,
) -> Result<StageReport> {
    let stage = units
        .first()
        .map(|u| u.stage().to_string())
        .unwrap_or_default();
    let started_at_ms = units
        .iter()
        .map(UnitHandle::started_at_ms)
        .min()
        .unwrap_or_else(|| time_provider.now_millis());

    info!(stage = %stage, units = units.len(), pending = input.unfinished(), "Shutting down stage");

    // 1. One marker per unit
    for _ in &units {
        input.close()?;
    }

    // 2. Every item and marker marked done
    input.join();

    // 3. Every thread gone
    let mut reports = Vec::with_capacity(units.len());
    let mut first_panic: Option<PipelineError> = None;
    for unit in units {
        match unit.wait() {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!(stage = %stage, error = %e, "Worker thread terminated abnormally");
                first_panic.get_or_insert(e);
            }
        }
    }

    if let Some(e) = first_panic {
        return Err(e);
    }

    let report = StageReport {
        stage,
        units: reports,
        started_at_ms,
        finished_at_ms: time_provider.now_millis(),
    };

    info!(
        stage = %report.stage,
        processed = report.processed(),
        forwarded = report.forwarded(),
        failed = report.failed(),
        elapsed_ms = report.elapsed_ms(),
        "Stage drained"
    );
    Ok(report)
}
