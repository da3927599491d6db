// Execution reports returned by stage shutdown

/// What a single worker unit did over its lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitReport {
    pub worker: usize,
    /// Items yielded to the stage function
    pub processed: usize,
    /// Results enqueued onto the output queue
    pub forwarded: usize,
    /// Empty results, or results with no output queue configured
    pub dropped: usize,
    /// One message per failed invocation (error or panic)
    pub failures: Vec<String>,
}

impl UnitReport {
    pub fn new(worker: usize) -> Self {
        Self {
            worker,
            ..Self::default()
        }
    }
}

/// Aggregate of every unit in one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: String,
    pub units: Vec<UnitReport>,
    pub started_at_ms: i64,
    pub finished_at_ms: i64,
}

impl StageReport {
    pub fn processed(&self) -> usize {
        self.units.iter().map(|u| u.processed).sum()
    }

    pub fn forwarded(&self) -> usize {
        self.units.iter().map(|u| u.forwarded).sum()
    }

    pub fn dropped(&self) -> usize {
        self.units.iter().map(|u| u.dropped).sum()
    }

    pub fn failed(&self) -> usize {
        self.units.iter().map(|u| u.failures.len()).sum()
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.finished_at_ms - self.started_at_ms
    }
}

/// Stage reports in pipeline order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn failed(&self) -> usize {
        self.stages.iter().map(StageReport::failed).sum()
    }
}
