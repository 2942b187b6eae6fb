//! Process-wide counters for ECO and signoff activity.
//!
//! Increments are silent. [`Metrics::flush`] emits the current values as one
//! `info!` event, typically at the end of a command.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

#[derive(Debug)]
pub struct Metrics {
    eco_iterations: AtomicU64,
    repair_failures: AtomicU64,
    signoff_checks: AtomicU64,
    signoff_check_errors: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            eco_iterations: AtomicU64::new(0),
            repair_failures: AtomicU64::new(0),
            signoff_checks: AtomicU64::new(0),
            signoff_check_errors: AtomicU64::new(0),
        }
    }

    /// One repair iteration recorded, failed or not.
    pub fn inc_eco_iterations(&self) {
        self.eco_iterations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_repair_failures(&self) {
        self.repair_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_signoff_checks(&self) {
        self.signoff_checks.fetch_add(1, Ordering::Relaxed);
    }

    /// A check ended in `error` (invocation, timeout or missing measurement).
    pub fn inc_signoff_check_errors(&self) {
        self.signoff_check_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            eco_iterations = self.eco_iterations(),
            repair_failures = self.repair_failures(),
            signoff_checks = self.signoff_checks(),
            signoff_check_errors = self.signoff_check_errors(),
        );
    }

    pub fn eco_iterations(&self) -> u64 {
        self.eco_iterations.load(Ordering::Relaxed)
    }

    pub fn repair_failures(&self) -> u64 {
        self.repair_failures.load(Ordering::Relaxed)
    }

    pub fn signoff_checks(&self) -> u64 {
        self.signoff_checks.load(Ordering::Relaxed)
    }

    pub fn signoff_check_errors(&self) -> u64 {
        self.signoff_check_errors.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        for counter in [
            &self.eco_iterations,
            &self.repair_failures,
            &self.signoff_checks,
            &self.signoff_check_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
