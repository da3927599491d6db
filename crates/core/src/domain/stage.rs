// Stage Domain Model

/// Labels and switches for one stage
///
/// Queue labels are explicit configuration; nothing in the worker loop
/// inspects the stage function to decide what to call its queues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageConfig {
    pub stage_name: String,
    pub input_label: String,
    pub output_label: String,
    /// Emit one progress line per completed item
    pub diagnostics: bool,
}

impl StageConfig {
    pub fn new(stage_name: impl Into<String>) -> Self {
        let stage_name = stage_name.into();
        Self {
            input_label: format!("{stage_name}.in"),
            output_label: format!("{stage_name}.out"),
            stage_name,
            diagnostics: false,
        }
    }

    pub fn with_input_label(mut self, label: impl Into<String>) -> Self {
        self.input_label = label.into();
        self
    }

    pub fn with_output_label(mut self, label: impl Into<String>) -> Self {
        self.output_label = label.into();
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    /// Thread name for the worker at `index`
    pub fn worker_name(&self, index: usize) -> String {
        format!("{}-{}", self.stage_name, index)
    }
}
