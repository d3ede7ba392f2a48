//! Status sinks for one-line human-readable reports.
//!
//! Reports are fire-and-forget: nothing the dispatcher decides depends on
//! what a sink does with them.

use std::collections::VecDeque;

use crate::util::clock::now_ms;

/// A single status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// Component that produced the line (pool or task name).
    pub source: String,
    /// Human-readable message.
    pub message: String,
    /// Timestamp milliseconds.
    pub created_at_ms: u64,
}

/// Status sink abstraction.
pub trait StatusSink {
    /// Record a status line.
    fn report(&mut self, line: StatusLine);
}

/// Sink that forwards every line to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn report(&mut self, line: StatusLine) {
        tracing::info!(source = %line.source, "{}", line.message);
    }
}

/// Bounded in-memory sink for testing and dev.
#[derive(Debug)]
pub struct InMemoryStatusSink {
    lines: VecDeque<StatusLine>,
    max_lines: usize,
}

impl InMemoryStatusSink {
    /// Create a new in-memory sink keeping at most `max_lines` lines.
    #[must_use]
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(max_lines.min(1024)),
            max_lines,
        }
    }

    /// Snapshot of stored lines, oldest first.
    #[must_use]
    pub fn lines(&self) -> Vec<StatusLine> {
        self.lines.iter().cloned().collect()
    }

    /// Stored messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.message.clone()).collect()
    }
}

impl StatusSink for InMemoryStatusSink {
    fn report(&mut self, line: StatusLine) {
        if self.max_lines == 0 {
            return;
        }
        if self.lines.len() >= self.max_lines {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }
}

impl<S: StatusSink + ?Sized> StatusSink for Box<S> {
    fn report(&mut self, line: StatusLine) {
        (**self).report(line);
    }
}

/// Helper to build a status line stamped with the current time.
pub fn build_status_line(source: impl Into<String>, message: impl Into<String>) -> StatusLine {
    StatusLine {
        source: source.into(),
        message: message.into(),
        created_at_ms: now_ms(),
    }
}
