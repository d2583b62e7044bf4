//! Lock-free lookup metrics
//!
//! Counters are updated from whichever task finishes a lookup; reporting
//! only loads them. All atomics use Relaxed ordering: these are statistics,
//! never used for coordination.

use crate::io::fetch::FetchError;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

#[derive(Default)]
pub struct Metrics {
    lookups_total: AtomicU64,
    lookups_ok: AtomicU64,
    lookups_timeout: AtomicU64,
    lookups_unreachable: AtomicU64,
    lookups_http_status: AtomicU64,
    lookups_malformed: AtomicU64,
    lookups_business: AtomicU64,
    /// Sum of lookup latencies in milliseconds
    latency_sum_ms: AtomicU64,
    latency_max_ms: AtomicU64,
    probes_total: AtomicU64,
    probes_reachable: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished lookup; `error` is `None` on success
    pub fn record_lookup(&self, error: Option<&FetchError>, latency_ms: u64) {
        self.lookups_total.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_ms, latency_ms);

        let counter = match error {
            None => &self.lookups_ok,
            Some(FetchError::Timeout) => &self.lookups_timeout,
            Some(FetchError::NetworkUnreachable) => &self.lookups_unreachable,
            Some(FetchError::HttpStatus(_)) => &self.lookups_http_status,
            Some(FetchError::MalformedResponse) => &self.lookups_malformed,
            Some(FetchError::Business(_)) => &self.lookups_business,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_probe(&self, reachable: bool) {
        self.probes_total.fetch_add(1, Ordering::Relaxed);
        if reachable {
            self.probes_reachable.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn lookups_total(&self) -> u64 {
        self.lookups_total.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> MetricsSummary {
        let lookups_total = self.lookups_total.load(Ordering::Relaxed);
        let latency_sum_ms = self.latency_sum_ms.load(Ordering::Relaxed);
        MetricsSummary {
            lookups_total,
            lookups_ok: self.lookups_ok.load(Ordering::Relaxed),
            lookups_timeout: self.lookups_timeout.load(Ordering::Relaxed),
            lookups_unreachable: self.lookups_unreachable.load(Ordering::Relaxed),
            lookups_http_status: self.lookups_http_status.load(Ordering::Relaxed),
            lookups_malformed: self.lookups_malformed.load(Ordering::Relaxed),
            lookups_business: self.lookups_business.load(Ordering::Relaxed),
            avg_latency_ms: if lookups_total > 0 { latency_sum_ms / lookups_total } else { 0 },
            max_latency_ms: self.latency_max_ms.load(Ordering::Relaxed),
            probes_total: self.probes_total.load(Ordering::Relaxed),
            probes_reachable: self.probes_reachable.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of the counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSummary {
    pub lookups_total: u64,
    pub lookups_ok: u64,
    pub lookups_timeout: u64,
    pub lookups_unreachable: u64,
    pub lookups_http_status: u64,
    pub lookups_malformed: u64,
    pub lookups_business: u64,
    pub avg_latency_ms: u64,
    pub max_latency_ms: u64,
    pub probes_total: u64,
    pub probes_reachable: u64,
}

impl MetricsSummary {
    pub fn lookups_failed(&self) -> u64 {
        self.lookups_total.saturating_sub(self.lookups_ok)
    }

    pub fn log(&self) {
        info!(
            lookups_total = %self.lookups_total,
            lookups_ok = %self.lookups_ok,
            lookups_failed = %self.lookups_failed(),
            timeouts = %self.lookups_timeout,
            unreachable = %self.lookups_unreachable,
            http_status = %self.lookups_http_status,
            malformed = %self.lookups_malformed,
            business = %self.lookups_business,
            avg_latency_ms = %self.avg_latency_ms,
            max_latency_ms = %self.max_latency_ms,
            probes_total = %self.probes_total,
            probes_reachable = %self.probes_reachable,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.lookups_total(), 0);
        assert_eq!(metrics.report().avg_latency_ms, 0);
    }

    #[test]
    fn test_record_lookup_outcomes() {
        let metrics = Metrics::new();

        metrics.record_lookup(None, 100);
        metrics.record_lookup(Some(&FetchError::Timeout), 300);
        metrics.record_lookup(Some(&FetchError::HttpStatus(503)), 20);
        metrics.record_lookup(Some(&FetchError::Business("Package not found".into())), 40);

        let summary = metrics.report();
        assert_eq!(summary.lookups_total, 4);
        assert_eq!(summary.lookups_ok, 1);
        assert_eq!(summary.lookups_timeout, 1);
        assert_eq!(summary.lookups_http_status, 1);
        assert_eq!(summary.lookups_business, 1);
        assert_eq!(summary.lookups_failed(), 3);
        assert_eq!(summary.avg_latency_ms, 115);
        assert_eq!(summary.max_latency_ms, 300);
    }

    #[test]
    fn test_record_probe() {
        let metrics = Metrics::new();
        metrics.record_probe(true);
        metrics.record_probe(false);

        let summary = metrics.report();
        assert_eq!(summary.probes_total, 2);
        assert_eq!(summary.probes_reachable, 1);
    }

    #[test]
    fn test_lookups_failed_never_underflows() {
        // ok loaded after total can run ahead of it under concurrent lookups
        let summary = MetricsSummary {
            lookups_total: 3,
            lookups_ok: 4,
            lookups_timeout: 0,
            lookups_unreachable: 0,
            lookups_http_status: 0,
            lookups_malformed: 0,
            lookups_business: 0,
            avg_latency_ms: 0,
            max_latency_ms: 0,
            probes_total: 0,
            probes_reachable: 0,
        };
        assert_eq!(summary.lookups_failed(), 0);
    }

    #[test]
    fn test_update_atomic_max() {
        let max = AtomicU64::new(10);
        update_atomic_max(&max, 5);
        assert_eq!(max.load(Ordering::Relaxed), 10);
        update_atomic_max(&max, 50);
        assert_eq!(max.load(Ordering::Relaxed), 50);
    }
}
