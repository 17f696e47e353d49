//! Run-scoped diagnostics.
//!
//! Recoverable anomalies (missing keys, duplicate cells, unavailable
//! metrics) never stop a run; they are reported through a [`DiagnosticSink`]
//! owned by the caller and passed to each component that may warn.
//!
//! Every warning is forwarded to `tracing::warn!` so it reaches the
//! diagnostic stream configured by the binary, and is also kept in memory
//! so callers can inspect what was reported.

use std::collections::HashSet;
use tracing::warn;

/// Collects warnings for one pipeline run.
///
/// `warn_once` deduplicates by message content: a condition that repeats
/// thousands of times is reported once, and the repeats are only counted.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    /// Messages already emitted through `warn_once`
    seen: HashSet<String>,
    /// Every emitted message, in order
    messages: Vec<String>,
    /// Number of `warn_once` calls swallowed as duplicates
    suppressed: usize,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits a warning unconditionally.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.messages.push(message);
    }

    /// Emits a warning unless the same message was already emitted once.
    ///
    /// Returns `true` when the message was emitted.
    pub fn warn_once(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        if self.seen.contains(&message) {
            self.suppressed += 1;
            return false;
        }
        self.seen.insert(message.clone());
        self.warn(message);
        true
    }

    /// Returns all emitted messages in emission order.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Returns true if any emitted message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.contains(needle))
    }

    /// Number of duplicate `warn_once` calls that were not emitted.
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    /// Returns true if nothing was emitted.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
