//! Structured lifecycle events for ECO, signoff and readiness runs.
//!
//! Every emitter logs one `tracing` event carrying an `event` field so log
//! pipelines can filter on it. Toolchain failures are emitted at `warn`.

use tracing::{info, warn};

use crate::domain::eco::{EcoIterationResult, StopReason};
use crate::domain::readiness::Grade;
use crate::domain::signoff::{CheckKind, CheckStatus};

/// RAII guard for a span tagging everything inside one design run.
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str, design: &str) -> Self {
        let span = tracing::info_span!("tapeout.run", run_id = %run_id, design = %design);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_eco_started(run_id: &str, design: &str, initial_wns_ns: f64, max_iterations: u32) {
    info!(
        event = "eco.started",
        run_id = %run_id,
        design = %design,
        initial_wns_ns = initial_wns_ns,
        max_iterations = max_iterations,
    );
}

pub fn emit_eco_iteration(run_id: &str, it: &EcoIterationResult) {
    info!(
        event = "eco.iteration",
        run_id = %run_id,
        iteration = it.iteration,
        before_wns_ns = it.before_wns_ns,
        after_wns_ns = it.after_wns_ns,
        fixes_applied = it.fixes_applied,
        converged = it.converged,
        failed = it.failed(),
    );
}

pub fn emit_eco_finished(
    run_id: &str,
    stop_reason: StopReason,
    final_wns_ns: f64,
    timing_met: bool,
    duration_ms: u64,
) {
    info!(
        event = "eco.finished",
        run_id = %run_id,
        stop_reason = ?stop_reason,
        final_wns_ns = final_wns_ns,
        timing_met = timing_met,
        duration_ms = duration_ms,
    );
}

pub fn emit_signoff_check(run_id: &str, check: CheckKind, status: CheckStatus, violations: u32) {
    info!(
        event = "signoff.check",
        run_id = %run_id,
        check = check.name(),
        status = ?status,
        violations = violations,
    );
}

pub fn emit_signoff_finished(run_id: &str, overall: CheckStatus, checks: usize, duration_ms: u64) {
    info!(
        event = "signoff.finished",
        run_id = %run_id,
        overall = ?overall,
        checks = checks,
        duration_ms = duration_ms,
    );
}

pub fn emit_readiness_scored(design: &str, overall: f64, grade: Grade, tapeout_ready: bool) {
    info!(
        event = "readiness.scored",
        design = %design,
        overall = overall,
        grade = ?grade,
        tapeout_ready = tapeout_ready,
    );
}

/// A toolchain call failed; `operation` names the adapter method or check.
pub fn emit_toolchain_failure(run_id: &str, operation: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "toolchain.failure",
        run_id = %run_id,
        operation = %operation,
        error = %error,
    );
}
