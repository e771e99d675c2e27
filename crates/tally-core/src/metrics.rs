//! Global atomic counters for tally observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. before a CLI command exits).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    activities_recorded: AtomicU64,
    duplicates_ignored: AtomicU64,
    resets: AtomicU64,
    persist_failures: AtomicU64,
    stats_computed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            activities_recorded: AtomicU64::new(0),
            duplicates_ignored: AtomicU64::new(0),
            resets: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
            stats_computed: AtomicU64::new(0),
        }
    }

    pub fn inc_activities_recorded(&self) {
        self.activities_recorded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "activities_recorded", "counter incremented");
    }

    pub fn inc_duplicates_ignored(&self) {
        self.duplicates_ignored.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "duplicates_ignored", "counter incremented");
    }

    /// Period and full resets that wrote a change.
    pub fn inc_resets(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "resets", "counter incremented");
    }

    pub fn inc_persist_failures(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "persist_failures", "counter incremented");
    }

    pub fn inc_stats_computed(&self) {
        self.stats_computed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "stats_computed", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            activities_recorded = self.activities_recorded(),
            duplicates_ignored = self.duplicates_ignored(),
            resets = self.resets(),
            persist_failures = self.persist_failures(),
            stats_computed = self.stats_computed(),
        );
    }

    pub fn activities_recorded(&self) -> u64 {
        self.activities_recorded.load(Ordering::Relaxed)
    }

    pub fn duplicates_ignored(&self) -> u64 {
        self.duplicates_ignored.load(Ordering::Relaxed)
    }

    pub fn resets(&self) -> u64 {
        self.resets.load(Ordering::Relaxed)
    }

    pub fn persist_failures(&self) -> u64 {
        self.persist_failures.load(Ordering::Relaxed)
    }

    pub fn stats_computed(&self) -> u64 {
        self.stats_computed.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.activities_recorded.store(0, Ordering::Relaxed);
        self.duplicates_ignored.store(0, Ordering::Relaxed);
        self.resets.store(0, Ordering::Relaxed);
        self.persist_failures.store(0, Ordering::Relaxed);
        self.stats_computed.store(0, Ordering::Relaxed);
    }
}
