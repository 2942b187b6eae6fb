//! ECO convergence loop.
//!
//! ```text
//! INIT ──baseline──▶ ITERATING ──▶ Converged | TargetMet | MaxIterationsReached | ToolFailure ──▶ DONE
//! ```
//!
//! Iterations are strictly sequential: each repair call mutates the design
//! held by the tool exactly once, and the next call starts only after its
//! measurement is in. A failed or timed-out repair is recorded as a failed
//! iteration and never as "no change".

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;
use uuid::Uuid;

use crate::config::EcoConfig;
use crate::domain::eco::{
    EcoIterationResult, EcoResult, IterationFailure, IterationFailureKind, StopReason,
};
use crate::domain::error::{Result, ToolchainError};
use crate::fix_recommender::recommend_fixes;
use crate::metrics::METRICS;
use crate::obs;
use crate::toolchain::{
    with_timeout, DesignSnapshot, RepairOptions, RepairOutcome, ToolchainAdapter,
};
use crate::violation_analyzer::analyze_timing;

/// WNS movement below this is treated as no progress.
pub const CONVERGENCE_EPSILON_NS: f64 = 0.001;

/// Drives repair/measure iterations through an injected adapter.
pub struct EcoOptimizer {
    adapter: Arc<dyn ToolchainAdapter>,
    config: EcoConfig,
}

/// Mutable loop state between iterations.
struct LoopState {
    wns_ns: f64,
    tns_ns: f64,
    iterations: Vec<EcoIterationResult>,
    total_fixes: u32,
    consecutive_failures: u32,
    converged: bool,
    stop_reason: Option<StopReason>,
}

impl EcoOptimizer {
    /// Rejects an invalid config before any adapter call is made.
    pub fn new(adapter: Arc<dyn ToolchainAdapter>, config: EcoConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { adapter, config })
    }

    pub fn config(&self) -> &EcoConfig {
        &self.config
    }

    async fn repair(
        &self,
        options: &RepairOptions,
        snapshot: &DesignSnapshot,
    ) -> std::result::Result<RepairOutcome, ToolchainError> {
        with_timeout(
            "repair_timing",
            self.config.iteration_timeout_secs,
            self.adapter.apply_repair(snapshot, options),
        )
        .await
    }

    /// Run the loop to a terminal state.
    ///
    /// Fails only when the baseline cannot be measured; every later
    /// toolchain failure is folded into the returned [`EcoResult`].
    pub async fn run(&self, snapshot: &DesignSnapshot) -> Result<EcoResult> {
        let run_id = Uuid::new_v4();
        let run_label = run_id.to_string();
        let _span = obs::RunSpan::enter(&run_label, &snapshot.name);
        let started = Instant::now();
        let config = &self.config;

        let baseline = match self.repair(&RepairOptions::measure_only(), snapshot).await {
            Ok(b) if b.is_failure_sentinel() => {
                let err = ToolchainError::invocation(
                    "repair_timing",
                    "baseline measurement returned the failure sentinel",
                );
                obs::emit_toolchain_failure(&run_label, "baseline", &err);
                return Err(err.into());
            }
            Ok(b) => b,
            Err(e) => {
                obs::emit_toolchain_failure(&run_label, "baseline", &e);
                return Err(e.into());
            }
        };
        obs::emit_eco_started(&run_label, &snapshot.name, baseline.wns_ns, config.max_iterations);

        let mut state = LoopState {
            wns_ns: baseline.wns_ns,
            tns_ns: baseline.tns_ns,
            iterations: Vec::with_capacity(config.max_iterations as usize),
            total_fixes: 0,
            consecutive_failures: 0,
            converged: false,
            stop_reason: None,
        };

        if baseline.wns_ns >= config.target_wns_ns {
            debug!(wns_ns = baseline.wns_ns, "baseline already meets target");
            state.converged = true;
            state.stop_reason = Some(StopReason::TargetMet);
        } else {
            let options = config.repair_options();
            for iteration in 1..=config.max_iterations {
                self.step(&run_label, iteration, &options, snapshot, &mut state)
                    .await;
                if state.stop_reason.is_some() {
                    break;
                }
            }
        }

        let stop_reason = state
            .stop_reason
            .unwrap_or(StopReason::MaxIterationsReached);
        let timing_met = state.wns_ns >= config.target_wns_ns;

        let analysis = analyze_timing(self.adapter.as_ref(), snapshot).await;
        let remaining_violations = analysis.violations();
        let remaining_recommendations = if timing_met {
            Vec::new()
        } else {
            recommend_fixes(&remaining_violations, config)
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        obs::emit_eco_finished(&run_label, stop_reason, state.wns_ns, timing_met, duration_ms);

        Ok(EcoResult {
            run_id,
            design: snapshot.name.clone(),
            iterations: state.iterations,
            total_fixes_applied: state.total_fixes,
            initial_wns_ns: baseline.wns_ns,
            final_wns_ns: state.wns_ns,
            initial_tns_ns: baseline.tns_ns,
            final_tns_ns: state.tns_ns,
            timing_met,
            converged: state.converged,
            stop_reason,
            duration_ms,
            remaining_recommendations,
            remaining_violations,
            analysis_conclusive: analysis.is_conclusive(),
        })
    }

    /// One repair/measure iteration. Sets `state.stop_reason` on a terminal
    /// transition.
    async fn step(
        &self,
        run_label: &str,
        iteration: u32,
        options: &RepairOptions,
        snapshot: &DesignSnapshot,
        state: &mut LoopState,
    ) {
        let config = &self.config;
        let iteration_started = Instant::now();
        let outcome = self.repair(options, snapshot).await;
        METRICS.inc_eco_iterations();

        let measured = match outcome {
            Ok(o) if !o.is_failure_sentinel() => o,
            failed => {
                let failure = match failed {
                    Ok(_) => IterationFailure {
                        kind: IterationFailureKind::Sentinel,
                        message: "repair returned the failure sentinel".to_string(),
                    },
                    Err(e) => IterationFailure {
                        kind: if e.is_timeout() {
                            IterationFailureKind::Timeout
                        } else {
                            IterationFailureKind::Invocation
                        },
                        message: e.to_string(),
                    },
                };
                METRICS.inc_repair_failures();
                obs::emit_toolchain_failure(run_label, "repair_timing", &failure.message);

                let record = EcoIterationResult {
                    iteration,
                    before_wns_ns: state.wns_ns,
                    after_wns_ns: state.wns_ns,
                    before_tns_ns: state.tns_ns,
                    after_tns_ns: state.tns_ns,
                    fixes_applied: 0,
                    converged: false,
                    duration_ms: iteration_started.elapsed().as_millis() as u64,
                    failure: Some(failure),
                };
                obs::emit_eco_iteration(run_label, &record);
                state.iterations.push(record);

                state.consecutive_failures += 1;
                if state.consecutive_failures >= config.max_consecutive_failures {
                    state.stop_reason = Some(StopReason::ToolFailure);
                }
                return;
            }
        };

        state.consecutive_failures = 0;
        let improvement = state.wns_ns - measured.wns_ns;
        let stalled = improvement.abs() < CONVERGENCE_EPSILON_NS || measured.changes_applied == 0;
        let target_met = measured.wns_ns >= config.target_wns_ns;

        let record = EcoIterationResult {
            iteration,
            before_wns_ns: state.wns_ns,
            after_wns_ns: measured.wns_ns,
            before_tns_ns: state.tns_ns,
            after_tns_ns: measured.tns_ns,
            fixes_applied: measured.changes_applied,
            converged: stalled || target_met,
            duration_ms: iteration_started.elapsed().as_millis() as u64,
            failure: None,
        };
        obs::emit_eco_iteration(run_label, &record);
        state.iterations.push(record);

        state.wns_ns = measured.wns_ns;
        state.tns_ns = measured.tns_ns;
        state.total_fixes += measured.changes_applied;
        state.converged |= stalled || target_met;

        if config.stop_on_convergence {
            if target_met {
                state.stop_reason = Some(StopReason::TargetMet);
            } else if stalled {
                state.stop_reason = Some(StopReason::Converged);
            }
        }
    }
}
