//! Execution metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for query execution.
///
/// All counters use relaxed atomics; a registry can be shared across
/// runners behind an `Arc`.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    queries_executed: AtomicU64,
    queries_failed: AtomicU64,
    documents_returned: AtomicU64,
    yields: AtomicU64,
    invalidations: AtomicU64,
    forced_fetches: AtomicU64,
    duplicates_dropped: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment queries run to EOF
    pub fn increment_queries_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment failed queries
    pub fn increment_queries_failed(&self) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment documents handed to callers
    pub fn increment_documents_returned(&self) {
        self.documents_returned.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment yields
    pub fn increment_yields(&self) {
        self.yields.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment delivered invalidations
    pub fn increment_invalidations(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Add forced fetches reported by a finished plan
    pub fn add_forced_fetches(&self, n: u64) {
        self.forced_fetches.fetch_add(n, Ordering::Relaxed);
    }

    /// Add dropped duplicates reported by a finished plan
    pub fn add_duplicates_dropped(&self, n: u64) {
        self.duplicates_dropped.fetch_add(n, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            documents_returned: self.documents_returned.load(Ordering::Relaxed),
            yields: self.yields.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            forced_fetches: self.forced_fetches.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
        }
    }

    /// Snapshot rendered as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_default()
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queries_executed: u64,
    pub queries_failed: u64,
    pub documents_returned: u64,
    pub yields: u64,
    pub invalidations: u64,
    pub forced_fetches: u64,
    pub duplicates_dropped: u64,
}
