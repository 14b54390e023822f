//! In-memory completion sink.

use parking_lot::Mutex;

use crate::core::{AppResult, CompletionSink};

/// Sink that keeps lines in memory for development/testing.
#[derive(Debug, Default)]
pub struct InMemorySink {
    lines: Mutex<Vec<String>>,
}

impl InMemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of appended lines, in append order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Number of appended lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// Whether nothing has been appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

impl CompletionSink for InMemorySink {
    fn append(&self, line: &str) -> AppResult<()> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }
}
