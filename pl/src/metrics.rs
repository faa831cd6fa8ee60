//! Run metrics
//!
//! An explicit metrics context threaded through the engine instead of a
//! process-wide accumulator. Every agent and parser records into the same
//! shared instance; the caller reads the totals after the run drains.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters accumulated over one weaving run.
#[derive(Debug, Default)]
pub struct RunMetrics {
    agents: AtomicU64,
    fragments: AtomicU64,
    tags: AtomicU64,
    completion_micros: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent_spawned(&self) {
        self.agents.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fragment_parsed(&self) {
        self.fragments.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tag_opened(&self) {
        self.tags.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the wall time of one finished completion call.
    pub fn record_completion(&self, elapsed: Duration) {
        self.completion_micros.fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn agents(&self) -> u64 {
        self.agents.load(Ordering::Relaxed)
    }

    pub fn fragments(&self) -> u64 {
        self.fragments.load(Ordering::Relaxed)
    }

    pub fn tags(&self) -> u64 {
        self.tags.load(Ordering::Relaxed)
    }

    /// Accumulated completion wall time across all agents. Concurrent calls
    /// overlap, so this can exceed the run's own elapsed time.
    pub fn completion_time(&self) -> Duration {
        Duration::from_micros(self.completion_micros.load(Ordering::Relaxed))
    }

    pub fn summary(&self) -> String {
        format!(
            "{} agents, {} tags, {} fragments, {:.2}s total completion time",
            self.agents(),
            self.tags(),
            self.fragments(),
            self.completion_time().as_secs_f64(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = RunMetrics::new();
        metrics.agent_spawned();
        metrics.agent_spawned();
        metrics.tag_opened();
        metrics.fragment_parsed();
        metrics.record_completion(Duration::from_millis(250));
        metrics.record_completion(Duration::from_millis(750));

        assert_eq!(metrics.agents(), 2);
        assert_eq!(metrics.tags(), 1);
        assert_eq!(metrics.fragments(), 1);
        assert_eq!(metrics.completion_time(), Duration::from_secs(1));
    }

    #[test]
    fn test_summary_format() {
        let metrics = RunMetrics::new();
        metrics.agent_spawned();
        assert!(metrics.summary().starts_with("1 agents"));
    }
}
