use std::sync::atomic::{AtomicU64, Ordering};

use crate::metrics;
use crate::record::RecordOutcome;

/// Running totals per outcome, shared by all partition workers
#[derive(Debug, Default)]
pub struct OutcomeStats {
    persisted: AtomicU64,
    duplicate: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeSnapshot {
    pub persisted: u64,
    pub duplicate: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl OutcomeSnapshot {
    pub fn total(&self) -> u64 {
        self.persisted + self.duplicate + self.skipped + self.failed
    }
}

impl OutcomeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &RecordOutcome) {
        let counter = match outcome {
            RecordOutcome::Persisted(result) if result.is_duplicate() => &self.duplicate,
            RecordOutcome::Persisted(_) => &self.persisted,
            RecordOutcome::Skipped(_) => &self.skipped,
            RecordOutcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::record_outcome(outcome.label());
    }

    pub fn snapshot(&self) -> OutcomeSnapshot {
        OutcomeSnapshot {
            persisted: self.persisted.load(Ordering::Relaxed),
            duplicate: self.duplicate.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
