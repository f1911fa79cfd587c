//! Request lifecycle tracking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Lifecycle phases for a composed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposePhase {
    /// Request received, context and template being retrieved.
    Start,
    /// Token sequence is being resolved.
    Composing,
    /// Status and headers have been committed to the client.
    HeadCommitted,
    /// Body fully streamed.
    Completion,
    /// Request aborted.
    Error(String),
}

/// Timing context for observability.
#[derive(Debug, Clone)]
pub struct TimingContext {
    start: Instant,
    marks: HashMap<String, Instant>,
}

impl TimingContext {
    /// Create a new timing context.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            marks: HashMap::new(),
        }
    }

    /// Record a timing mark. Later marks with the same name win.
    pub fn mark(&mut self, name: &str) {
        self.marks.insert(name.to_string(), Instant::now());
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time from start to a named mark.
    pub fn since_start(&self, name: &str) -> Option<Duration> {
        self.marks.get(name).map(|t| t.duration_since(self.start))
    }

    /// Time to committed head.
    pub fn time_to_head(&self) -> Option<Duration> {
        self.since_start("head_committed")
    }

    /// Request start instant.
    pub fn started_at(&self) -> Instant {
        self.start
    }
}

impl Default for TimingContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_mark() {
        let timing = TimingContext::new();
        assert!(timing.time_to_head().is_none());
    }

    #[test]
    fn test_mark_after_start() {
        let mut timing = TimingContext::new();
        timing.mark("head_committed");
        let head = timing.time_to_head().unwrap();
        assert!(head <= timing.elapsed());
    }
}
