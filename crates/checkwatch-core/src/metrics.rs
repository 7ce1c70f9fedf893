//! Per-session atomic counters.
//!
//! Counters are incremented silently by the session. Call
//! [`SessionMetrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. when a session completes or is stopped).

use std::sync::atomic::{AtomicU64, Ordering};

/// Lightweight atomic counters, no allocations, no locking.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    fetches_issued: AtomicU64,
    results_published: AtomicU64,
    fetch_errors: AtomicU64,
    stale_discards: AtomicU64,
    coalesced_starts: AtomicU64,
}

impl SessionMetrics {
    pub const fn new() -> Self {
        Self {
            fetches_issued: AtomicU64::new(0),
            results_published: AtomicU64::new(0),
            fetch_errors: AtomicU64::new(0),
            stale_discards: AtomicU64::new(0),
            coalesced_starts: AtomicU64::new(0),
        }
    }

    pub fn inc_fetches(&self) {
        self.fetches_issued.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "fetches_issued", "counter incremented");
    }

    pub fn inc_published(&self) {
        self.results_published.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "results_published", "counter incremented");
    }

    pub fn inc_fetch_errors(&self) {
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "fetch_errors", "counter incremented");
    }

    /// A settled fetch belonged to a superseded generation and was dropped.
    pub fn inc_stale_discards(&self) {
        self.stale_discards.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "stale_discards", "counter incremented");
    }

    pub fn inc_coalesced(&self) {
        self.coalesced_starts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "coalesced_starts", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            fetches_issued = self.fetches_issued(),
            results_published = self.results_published(),
            fetch_errors = self.fetch_errors(),
            stale_discards = self.stale_discards(),
            coalesced_starts = self.coalesced_starts(),
        );
    }

    pub fn fetches_issued(&self) -> u64 {
        self.fetches_issued.load(Ordering::Relaxed)
    }

    pub fn results_published(&self) -> u64 {
        self.results_published.load(Ordering::Relaxed)
    }

    pub fn fetch_errors(&self) -> u64 {
        self.fetch_errors.load(Ordering::Relaxed)
    }

    pub fn stale_discards(&self) -> u64 {
        self.stale_discards.load(Ordering::Relaxed)
    }

    pub fn coalesced_starts(&self) -> u64 {
        self.coalesced_starts.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.fetches_issued.store(0, Ordering::Relaxed);
        self.results_published.store(0, Ordering::Relaxed);
        self.fetch_errors.store(0, Ordering::Relaxed);
        self.stale_discards.store(0, Ordering::Relaxed);
        self.coalesced_starts.store(0, Ordering::Relaxed);
    }
}
