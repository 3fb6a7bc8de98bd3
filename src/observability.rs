//! Tracing setup and job counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber; `RUST_LOG` overrides `default_filter`
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // Ignore a second install (tests, repeated CLI setup)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Metrics handle for recording job counters
#[derive(Debug, Default)]
pub struct Metrics {
    payments_claimed: AtomicU64,
    payments_settled: AtomicU64,
    payments_failed: AtomicU64,
    payments_given_up: AtomicU64,
    batches_timed_out: AtomicU64,
    objects_reclaimed: AtomicU64,
    reclamation_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payments_claimed(&self, count: usize) {
        self.payments_claimed.fetch_add(count as u64, Ordering::Relaxed);
        tracing::debug!(counter = "payments_claimed", count, "Metric incremented");
    }

    pub fn payment_settled(&self) {
        self.payments_settled.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "payments_settled", "Metric incremented");
    }

    pub fn payment_failed(&self) {
        self.payments_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "payments_failed", "Metric incremented");
    }

    pub fn payments_given_up(&self, count: usize) {
        self.payments_given_up.fetch_add(count as u64, Ordering::Relaxed);
        tracing::debug!(counter = "payments_given_up", count, "Metric incremented");
    }

    pub fn batch_timed_out(&self) {
        self.batches_timed_out.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "batches_timed_out", "Metric incremented");
    }

    pub fn object_reclaimed(&self) {
        self.objects_reclaimed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "objects_reclaimed", "Metric incremented");
    }

    pub fn reclamation_failed(&self) {
        self.reclamation_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "reclamation_failures", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            payments_claimed: self.payments_claimed.load(Ordering::Relaxed),
            payments_settled: self.payments_settled.load(Ordering::Relaxed),
            payments_failed: self.payments_failed.load(Ordering::Relaxed),
            payments_given_up: self.payments_given_up.load(Ordering::Relaxed),
            batches_timed_out: self.batches_timed_out.load(Ordering::Relaxed),
            objects_reclaimed: self.objects_reclaimed.load(Ordering::Relaxed),
            reclamation_failures: self.reclamation_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub payments_claimed: u64,
    pub payments_settled: u64,
    pub payments_failed: u64,
    pub payments_given_up: u64,
    pub batches_timed_out: u64,
    pub objects_reclaimed: u64,
    pub reclamation_failures: u64,
}
