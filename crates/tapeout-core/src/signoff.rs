//! Signoff orchestrator: runs the check battery and aggregates one report.
//!
//! Checks are read-only against the snapshot and independent of each other.
//! A check that cannot produce a verdict becomes `error` and never aborts
//! its siblings. With `parallel` set the checks run concurrently and are
//! joined before the overall status is derived.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use uuid::Uuid;

use crate::config::SignoffConfig;
use crate::domain::error::Result;
use crate::domain::signoff::{
    CheckFailure, CheckFailureKind, CheckKind, CheckStatus, SignoffCheckResult, SignoffReport,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::toolchain::{with_timeout, CheckOutcome, DesignSnapshot, ToolchainAdapter};

/// Verdict of one check from its raw outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckVerdict {
    pub status: CheckStatus,
    /// Human-readable summary, shown first in the check's details.
    pub summary: String,
}

/// Apply the pass/fail limits for `check` to a raw outcome.
///
/// Metric checks (IR drop, timing) without a measurement cannot be judged and
/// return a `MissingMeasurement` failure.
pub fn evaluate_check(
    check: CheckKind,
    outcome: &CheckOutcome,
    config: &SignoffConfig,
) -> std::result::Result<CheckVerdict, CheckFailure> {
    let count = outcome.violation_count;
    let verdict = match check {
        CheckKind::Drc => CheckVerdict {
            status: if count == 0 {
                CheckStatus::Pass
            } else if count <= config.drc_max_violations {
                CheckStatus::Warning
            } else {
                CheckStatus::Fail
            },
            summary: format!(
                "{} DRC violation(s) (limit {})",
                count, config.drc_max_violations
            ),
        },
        CheckKind::Lvs => {
            let matched = outcome.circuits_match.unwrap_or(count == 0);
            CheckVerdict {
                status: if matched {
                    CheckStatus::Pass
                } else {
                    CheckStatus::Fail
                },
                summary: if matched {
                    "circuits match".to_string()
                } else {
                    format!("circuits do not match ({} mismatch(es))", count)
                },
            }
        }
        CheckKind::Antenna => CheckVerdict {
            status: if count == 0 {
                CheckStatus::Pass
            } else {
                CheckStatus::Fail
            },
            summary: format!("{} antenna violation(s)", count),
        },
        CheckKind::IrDrop => {
            let worst_mv = outcome
                .metric
                .ok_or_else(|| missing_measurement("worst IR drop"))?;
            CheckVerdict {
                status: if worst_mv <= config.ir_drop_max_mv {
                    CheckStatus::Pass
                } else {
                    CheckStatus::Fail
                },
                summary: format!(
                    "worst IR drop {:.2} mV (limit {:.2} mV)",
                    worst_mv, config.ir_drop_max_mv
                ),
            }
        }
        CheckKind::Timing => {
            let wns = outcome.metric.ok_or_else(|| missing_measurement("WNS"))?;
            CheckVerdict {
                status: if wns >= config.min_slack_ns {
                    CheckStatus::Pass
                } else {
                    CheckStatus::Fail
                },
                summary: format!("WNS {:.3} ns (minimum {:.3} ns)", wns, config.min_slack_ns),
            }
        }
    };
    Ok(verdict)
}

fn missing_measurement(what: &str) -> CheckFailure {
    CheckFailure {
        kind: CheckFailureKind::MissingMeasurement,
        message: format!("tool output carried no {} measurement", what),
    }
}

pub struct SignoffOrchestrator {
    adapter: Arc<dyn ToolchainAdapter>,
    config: SignoffConfig,
}

impl SignoffOrchestrator {
    pub fn new(adapter: Arc<dyn ToolchainAdapter>, config: SignoffConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { adapter, config })
    }

    pub fn config(&self) -> &SignoffConfig {
        &self.config
    }

    /// Run every enabled check against `snapshot`.
    pub async fn run(&self, snapshot: &DesignSnapshot) -> SignoffReport {
        let run_id = Uuid::new_v4();
        let run_label = run_id.to_string();
        let _span = obs::RunSpan::enter(&run_label, &snapshot.name);
        let started_at = Utc::now();
        let started = Instant::now();

        let checks = if self.config.parallel {
            join_all(
                self.config
                    .enabled_checks
                    .iter()
                    .map(|check| self.run_check(*check, snapshot, &run_label)),
            )
            .await
        } else {
            let mut results = Vec::with_capacity(self.config.enabled_checks.len());
            for check in &self.config.enabled_checks {
                results.push(self.run_check(*check, snapshot, &run_label).await);
            }
            results
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let report = SignoffReport::new(
            run_id,
            snapshot.name.clone(),
            started_at,
            duration_ms,
            checks,
        );
        obs::emit_signoff_finished(
            &run_label,
            report.overall_status(),
            report.checks().len(),
            duration_ms,
        );
        report
    }

    async fn run_check(
        &self,
        check: CheckKind,
        snapshot: &DesignSnapshot,
        run_label: &str,
    ) -> SignoffCheckResult {
        let started = Instant::now();
        let limits = self.config.limits();
        let outcome = with_timeout(
            check.name(),
            self.config.check_timeout_secs,
            self.adapter.run_check(check, snapshot, &limits),
        )
        .await;
        METRICS.inc_signoff_checks();

        let result = match outcome {
            Ok(outcome) => match evaluate_check(check, &outcome, &self.config) {
                Ok(verdict) => {
                    let mut details = Vec::with_capacity(outcome.details.len() + 1);
                    details.push(verdict.summary);
                    details.extend(outcome.details);
                    SignoffCheckResult {
                        check,
                        status: verdict.status,
                        violation_count: outcome.violation_count,
                        details,
                        duration_ms: started.elapsed().as_millis() as u64,
                        report_path: outcome.report_path,
                        metric: outcome.metric,
                        failure: None,
                    }
                }
                Err(failure) => {
                    let mut result = SignoffCheckResult::errored(
                        check,
                        failure,
                        started.elapsed().as_millis() as u64,
                    );
                    result.report_path = outcome.report_path;
                    result
                }
            },
            Err(e) => {
                obs::emit_toolchain_failure(run_label, check.name(), &e);
                let kind = if e.is_timeout() {
                    CheckFailureKind::Timeout
                } else {
                    CheckFailureKind::Invocation
                };
                SignoffCheckResult::errored(
                    check,
                    CheckFailure {
                        kind,
                        message: e.to_string(),
                    },
                    started.elapsed().as_millis() as u64,
                )
            }
        };

        if result.status == CheckStatus::Error {
            METRICS.inc_signoff_check_errors();
        }
        obs::emit_signoff_check(run_label, check, result.status, result.violation_count);
        result
    }
}
