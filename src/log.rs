//! Per-package transcript accumulation.
//!
//! Every workflow invocation owns one [`LogAggregator`]. Command outcomes are
//! appended in execution order and the final [`LogBundle`] travels with the
//! result, whether the package succeeded or not.

use crate::command::CommandOutcome;

/// Ordered info and error lines collected for one package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBundle {
    pub info: Vec<String>,
    pub error: Vec<String>,
}

impl LogBundle {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.info.is_empty() && self.error.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct LogAggregator {
    bundle: LogBundle,
}

impl LogAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, outcome: &CommandOutcome) {
        self.bundle.info.extend(outcome.info_lines.iter().cloned());
        self.bundle.error.extend(outcome.error_lines.iter().cloned());
    }

    /// Appends the transcript produced by another operation (e.g. a clone).
    pub fn concat(&mut self, logs: LogBundle) {
        self.bundle.info.extend(logs.info);
        self.bundle.error.extend(logs.error);
    }

    pub fn info(&mut self, line: impl Into<String>) {
        self.bundle.info.push(line.into());
    }

    pub fn error(&mut self, line: impl Into<String>) {
        self.bundle.error.push(line.into());
    }

    #[must_use]
    pub fn snapshot(&self) -> LogBundle {
        self.bundle.clone()
    }

    pub fn into_bundle(self) -> LogBundle {
        self.bundle
    }
}
