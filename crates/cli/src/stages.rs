//! Stage functions for the URL pipeline: parse -> validate -> persist

use chrono::{DateTime, Utc};
use serde::Serialize;
use stagewise_core::{Stage, StageError};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// One input line with its 1-based line number
pub type Line = (usize, String);

/// Schemes the validate stage lets through
const ALLOWED_SCHEMES: [&str; 2] = ["http", "https"];

/// A line that looks like a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub line_no: usize,
    pub url: String,
    pub scheme: String,
    pub host: String,
}

/// A validated URL, ready to persist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub run_id: Uuid,
    pub line_no: usize,
    pub url: String,
    pub host: String,
    pub checked_at: DateTime<Utc>,
}

/// Parse stage
///
/// Blank lines and `#` comments are empty results. Anything else must look
/// like `scheme://host[/...]`.
pub fn parse_line((line_no, line): Line) -> Result<Option<Candidate>, String> {
    let url = line.trim();
    if url.is_empty() || url.starts_with('#') {
        return Ok(None);
    }

    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| format!("line {line_no}: missing scheme in '{url}'"))?;
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)) {
        return Err(format!("line {line_no}: invalid scheme '{scheme}'"));
    }

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return Err(format!("line {line_no}: missing host in '{url}'"));
    }

    Ok(Some(Candidate {
        line_no,
        url: url.to_string(),
        scheme: scheme.to_ascii_lowercase(),
        host: host.to_ascii_lowercase(),
    }))
}

/// Validate stage: keeps web URLs and stamps them with the run id
pub struct Validator {
    run_id: Uuid,
}

impl Validator {
    pub fn new(run_id: Uuid) -> Self {
        Self { run_id }
    }
}

impl Stage<Candidate> for Validator {
    type Output = Record;

    fn process(&self, candidate: Candidate) -> Result<Option<Record>, StageError> {
        if !ALLOWED_SCHEMES.contains(&candidate.scheme.as_str()) {
            tracing::debug!(line_no = candidate.line_no, scheme = %candidate.scheme, "Skipping non-web URL");
            return Ok(None);
        }

        Ok(Some(Record {
            run_id: self.run_id,
            line_no: candidate.line_no,
            url: candidate.url,
            host: candidate.host,
            checked_at: Utc::now(),
        }))
    }
}

/// Persist stage: one JSON object per line
///
/// Clones share the same writer, so the caller can keep one to flush after
/// the stage is shut down.
#[derive(Clone)]
pub struct JsonLinesSink {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl JsonLinesSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn flush(&self) -> std::io::Result<()> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
    }
}

impl Stage<Record> for JsonLinesSink {
    type Output = ();

    fn process(&self, record: Record) -> Result<Option<()>, StageError> {
        let mut line = serde_json::to_vec(&record).map_err(|e| StageError::Failed(e.to_string()))?;
        line.push(b'\n');

        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_all(&line)
            .map_err(|e| StageError::Failed(format!("write failed for line {}: {}", record.line_no, e)))?;
        Ok(None)
    }
}
