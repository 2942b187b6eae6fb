//! In-memory toolchain fake (testing only)
//!
//! `FakeToolchain` satisfies the [`ToolchainAdapter`] contract from scripted
//! responses and records every call, so loop and orchestrator behaviour can be
//! exercised deterministically without CAD tools installed.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::error::ToolchainError;
use crate::domain::signoff::CheckKind;
use crate::domain::timing::PathType;
use crate::toolchain::{
    CheckLimits, CheckOutcome, DesignSnapshot, RepairOptions, RepairOutcome, ToolchainAdapter,
    REPAIR_FAILURE_SENTINEL_NS,
};

/// One adapter call, as observed by the fake.
#[derive(Debug, Clone, PartialEq)]
pub enum FakeCall {
    TimingAnalysis(PathType),
    Measure,
    Repair(RepairOptions),
    Check(CheckKind),
}

#[derive(Debug)]
struct ScriptedRepair {
    delay: Option<Duration>,
    response: Result<RepairOutcome, ToolchainError>,
}

/// Scripted [`ToolchainAdapter`].
///
/// - Measure-only repair calls return the baseline.
/// - Repair calls pop the repair queue in order. Once it is empty they repeat
///   the last successful measurement with zero changes (a stalled tool).
/// - Unscripted timing reports and checks fail with `Unavailable`.
#[derive(Debug, Default)]
pub struct FakeToolchain {
    baseline: Option<Result<RepairOutcome, ToolchainError>>,
    timing: HashMap<PathType, Result<String, ToolchainError>>,
    checks: HashMap<CheckKind, Result<CheckOutcome, ToolchainError>>,
    check_delays: HashMap<CheckKind, Duration>,
    repairs: Mutex<VecDeque<ScriptedRepair>>,
    last_measurement: Mutex<Option<RepairOutcome>>,
    calls: Mutex<Vec<FakeCall>>,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    // -- builders ----------------------------------------------------------

    pub fn with_baseline(mut self, wns_ns: f64, tns_ns: f64) -> Self {
        self.baseline = Some(Ok(RepairOutcome {
            wns_ns,
            tns_ns,
            changes_applied: 0,
        }));
        self
    }

    pub fn with_baseline_error(mut self, error: ToolchainError) -> Self {
        self.baseline = Some(Err(error));
        self
    }

    pub fn with_timing_report(mut self, path_type: PathType, report: &str) -> Self {
        self.timing.insert(path_type, Ok(report.to_string()));
        self
    }

    pub fn with_timing_error(mut self, path_type: PathType, error: ToolchainError) -> Self {
        self.timing.insert(path_type, Err(error));
        self
    }

    /// Queue a successful repair iteration.
    pub fn then_repair(self, wns_ns: f64, tns_ns: f64, changes_applied: u32) -> Self {
        self.push_repair(
            None,
            Ok(RepairOutcome {
                wns_ns,
                tns_ns,
                changes_applied,
            }),
        )
    }

    /// Queue a repair iteration that fails to invoke.
    pub fn then_repair_error(self, error: ToolchainError) -> Self {
        self.push_repair(None, Err(error))
    }

    /// Queue a repair iteration that answers with the failure sentinel.
    pub fn then_sentinel(self) -> Self {
        self.push_repair(
            None,
            Ok(RepairOutcome {
                wns_ns: REPAIR_FAILURE_SENTINEL_NS,
                tns_ns: 0.0,
                changes_applied: 0,
            }),
        )
    }

    /// Queue a repair iteration that sleeps before answering.
    pub fn then_slow_repair(
        self,
        delay: Duration,
        wns_ns: f64,
        tns_ns: f64,
        changes_applied: u32,
    ) -> Self {
        self.push_repair(
            Some(delay),
            Ok(RepairOutcome {
                wns_ns,
                tns_ns,
                changes_applied,
            }),
        )
    }

    pub fn with_check(mut self, check: CheckKind, outcome: CheckOutcome) -> Self {
        self.checks.insert(check, Ok(outcome));
        self
    }

    pub fn with_check_error(mut self, check: CheckKind, error: ToolchainError) -> Self {
        self.checks.insert(check, Err(error));
        self
    }

    pub fn with_check_delay(mut self, check: CheckKind, delay: Duration) -> Self {
        self.check_delays.insert(check, delay);
        self
    }

    fn push_repair(
        self,
        delay: Option<Duration>,
        response: Result<RepairOutcome, ToolchainError>,
    ) -> Self {
        self.repairs
            .lock()
            .unwrap()
            .push_back(ScriptedRepair { delay, response });
        self
    }

    // -- inspection --------------------------------------------------------

    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of repair invocations (measure-only calls excluded).
    pub fn repair_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, FakeCall::Repair(_)))
            .count()
    }

    pub fn check_calls(&self) -> Vec<CheckKind> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                FakeCall::Check(kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: FakeCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ToolchainAdapter for FakeToolchain {
    async fn run_timing_analysis(
        &self,
        _snapshot: &DesignSnapshot,
        path_type: PathType,
    ) -> Result<String, ToolchainError> {
        self.record(FakeCall::TimingAnalysis(path_type));
        self.timing.get(&path_type).cloned().unwrap_or_else(|| {
            Err(ToolchainError::Unavailable(format!(
                "no {} report scripted",
                path_type.name()
            )))
        })
    }

    async fn apply_repair(
        &self,
        _snapshot: &DesignSnapshot,
        options: &RepairOptions,
    ) -> Result<RepairOutcome, ToolchainError> {
        if options.is_measure_only() {
            self.record(FakeCall::Measure);
            let baseline = self
                .baseline
                .clone()
                .unwrap_or_else(|| Err(ToolchainError::Unavailable("no baseline scripted".into())));
            if let Ok(outcome) = &baseline {
                *self.last_measurement.lock().unwrap() = Some(*outcome);
            }
            return baseline;
        }

        self.record(FakeCall::Repair(options.clone()));
        let next = self.repairs.lock().unwrap().pop_front();
        let Some(scripted) = next else {
            return match *self.last_measurement.lock().unwrap() {
                Some(last) => Ok(RepairOutcome {
                    changes_applied: 0,
                    ..last
                }),
                None => Err(ToolchainError::Unavailable("no repair scripted".into())),
            };
        };

        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }
        if let Ok(outcome) = &scripted.response {
            if !outcome.is_failure_sentinel() {
                *self.last_measurement.lock().unwrap() = Some(*outcome);
            }
        }
        scripted.response
    }

    async fn run_check(
        &self,
        check: CheckKind,
        _snapshot: &DesignSnapshot,
        _limits: &CheckLimits,
    ) -> Result<CheckOutcome, ToolchainError> {
        self.record(FakeCall::Check(check));
        if let Some(delay) = self.check_delays.get(&check) {
            tokio::time::sleep(*delay).await;
        }
        self.checks.get(&check).cloned().unwrap_or_else(|| {
            Err(ToolchainError::Unavailable(format!(
                "no {} result scripted",
                check.name()
            )))
        })
    }
}
