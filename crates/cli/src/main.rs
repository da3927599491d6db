//! Stagewise - URL pipeline runner
//!
//! Reads one URL per line and pushes them through three worker pools:
//! parse -> validate -> persist (JSON lines).

mod settings;
mod stages;
mod telemetry;
#[cfg(test)]
mod test_support;

use anyhow::{bail, Context, Result};
use clap::Parser;
use stagewise_core::{
    fallible, ConsoleReporter, Pipeline, ProgressReporter, SignalQueue, StageConfig, WorkerPool,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::settings::Settings;
use crate::stages::{parse_line, JsonLinesSink, Line, Validator};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "stagewise")]
#[command(about = "Run URLs through a parse -> validate -> persist worker pipeline", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, env = "STAGEWISE_CONFIG")]
    config: Option<PathBuf>,

    /// Input file, one URL per line (default: stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file for JSON-lines records (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print one progress line per processed item
    #[arg(long)]
    diagnostics: bool,

    /// Exit non-zero if any stage reported failures
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let settings = Settings::load(cli.config.as_deref())?;

    // 2. Initialize logging
    telemetry::init_logging(settings.log_format)?;
    info!("Stagewise v{} starting...", VERSION);

    // 3. Wire sources and sinks
    let reader: Box<dyn BufRead> = match &cli.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open input {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let writer: Box<dyn Write + Send> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create output {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let sink = JsonLinesSink::new(writer);

    // 4. Run
    // Progress lines go to stderr; stdout may be carrying the records
    let reporter: Arc<dyn ProgressReporter> = Arc::new(ConsoleReporter::stderr());
    let diagnostics = cli.diagnostics || settings.diagnostics;
    let failed = run(&settings, diagnostics, reporter, reader, sink.clone())?;
    sink.flush().context("Failed to flush output")?;

    if cli.strict && failed > 0 {
        bail!("{} item(s) failed", failed);
    }
    info!("Done.");
    Ok(())
}

/// Build the pipeline, feed it every input line and shut it down
///
/// Returns the number of failed items across all stages.
fn run(
    settings: &Settings,
    diagnostics: bool,
    reporter: Arc<dyn ProgressReporter>,
    reader: impl BufRead,
    sink: JsonLinesSink,
) -> Result<usize> {
    let run_id = Uuid::new_v4();
    info!(run_id = %run_id, ?settings, "Building pipeline");

    let lines = Arc::new(SignalQueue::<Line>::new(settings.queue_capacity)?);
    let candidates = Arc::new(SignalQueue::new(settings.queue_capacity)?);
    let records = Arc::new(SignalQueue::new(settings.queue_capacity)?);

    let parse = WorkerPool::builder(
        StageConfig::new("parse")
            .with_input_label("line_queue")
            .with_output_label("candidate_queue"),
    )
    .workers(settings.parse_workers)
    .diagnostics(diagnostics)
    .reporter(Arc::clone(&reporter))
    .spawn(fallible(parse_line), Arc::clone(&lines), Some(Arc::clone(&candidates)))?;

    let validate = WorkerPool::builder(
        StageConfig::new("validate")
            .with_input_label("candidate_queue")
            .with_output_label("record_queue"),
    )
    .workers(settings.validate_workers)
    .diagnostics(diagnostics)
    .reporter(Arc::clone(&reporter))
    .spawn(Validator::new(run_id), Arc::clone(&candidates), Some(Arc::clone(&records)))?;

    let persist = WorkerPool::builder(StageConfig::new("persist").with_input_label("record_queue"))
        .workers(settings.persist_workers)
        .diagnostics(diagnostics)
        .reporter(reporter)
        .spawn(sink, Arc::clone(&records), None)?;

    let pipeline = Pipeline::new().then(parse).then(validate).then(persist);

    // Stages must be shut down even if reading fails part-way
    let fed = feed(reader, &lines);
    let report = pipeline.shutdown()?;
    let fed = fed?;

    for stage in &report.stages {
        info!(
            stage = %stage.stage,
            processed = stage.processed(),
            forwarded = stage.forwarded(),
            dropped = stage.dropped(),
            failed = stage.failed(),
            elapsed_ms = stage.elapsed_ms(),
            "Stage summary"
        );
    }

    let failed = report.failed();
    if failed > 0 {
        warn!(failed, "Some items failed");
    }
    info!(lines = fed, run_id = %run_id, "Pipeline finished");
    Ok(failed)
}

/// Enqueue every line from `reader`, returning how many were read
fn feed(reader: impl BufRead, queue: &SignalQueue<Line>) -> Result<usize> {
    let mut count = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read input line {}", index + 1))?;
        queue.enqueue((index + 1, line))?;
        count += 1;
    }
    Ok(count)
}
