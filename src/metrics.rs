use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct PipelineMetrics {
    questions_answered: AtomicU64,
    summaries_produced: AtomicU64,
    rejected: AtomicU64,
    upstream_failures: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a question answered by the model.
    pub fn record_answer(&self) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a summary produced by the model.
    pub fn record_summary(&self) {
        self.summaries_produced.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an upload rejected by validation.
    pub fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed upstream completion.
    pub fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            summaries_produced: self.summaries_produced.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Questions answered since startup.
    pub questions_answered: u64,
    /// Summaries produced since startup.
    pub summaries_produced: u64,
    /// Uploads rejected before reaching the model.
    pub rejected: u64,
    /// Completions that failed upstream.
    pub upstream_failures: u64,
}
