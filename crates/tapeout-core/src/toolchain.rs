//! Toolchain adapter trait and the value types crossing it.
//!
//! The engine never runs CAD tools itself. Each component receives an
//! `Arc<dyn ToolchainAdapter>` so tests can inject [`crate::fakes::FakeToolchain`]
//! and production code can inject a process-backed implementation.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::ToolchainError;
use crate::domain::signoff::CheckKind;
use crate::domain::timing::PathType;

/// WNS value an adapter may return to signal that the repair invocation
/// failed. Never a genuine measurement.
pub const REPAIR_FAILURE_SENTINEL_NS: f64 = -999.0;

// ---------------------------------------------------------------------------
// Design snapshot
// ---------------------------------------------------------------------------

/// Placed-and-routed design state the tools operate on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DesignSnapshot {
    /// Top-level design name.
    pub name: String,

    /// Run directory holding the flow outputs.
    pub run_dir: PathBuf,

    /// OpenDB database (preferred over DEF when present).
    #[serde(default)]
    pub odb: Option<PathBuf>,

    #[serde(default)]
    pub def: Option<PathBuf>,

    #[serde(default)]
    pub netlist: Option<PathBuf>,

    #[serde(default)]
    pub sdc: Option<PathBuf>,

    #[serde(default)]
    pub spef: Option<PathBuf>,

    #[serde(default)]
    pub gds: Option<PathBuf>,

    /// Liberty timing libraries.
    #[serde(default)]
    pub liberty: Vec<PathBuf>,

    /// Technology and cell LEFs.
    #[serde(default)]
    pub lef: Vec<PathBuf>,
}

impl DesignSnapshot {
    pub fn new(name: impl Into<String>, run_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            run_dir: run_dir.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Repair
// ---------------------------------------------------------------------------

/// Options for one repair invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepairOptions {
    pub repair_setup: bool,
    pub repair_hold: bool,
    pub setup_margin_ns: f64,
    pub hold_margin_ns: f64,
    /// Placement utilization ceiling in percent.
    pub max_utilization_pct: f64,
    pub enable_gate_sizing: bool,
    pub enable_vt_swap: bool,
    pub enable_pin_swap: bool,
    pub enable_buffer_insertion: bool,
    pub enable_gate_cloning: bool,
}

impl RepairOptions {
    /// Measurement only: every transform disabled.
    pub fn measure_only() -> Self {
        Self {
            repair_setup: false,
            repair_hold: false,
            setup_margin_ns: 0.0,
            hold_margin_ns: 0.0,
            max_utilization_pct: 100.0,
            enable_gate_sizing: false,
            enable_vt_swap: false,
            enable_pin_swap: false,
            enable_buffer_insertion: false,
            enable_gate_cloning: false,
        }
    }

    pub fn is_measure_only(&self) -> bool {
        !self.repair_setup && !self.repair_hold
    }
}

/// Measurement after a repair invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RepairOutcome {
    pub wns_ns: f64,
    pub tns_ns: f64,
    pub changes_applied: u32,
}

impl RepairOutcome {
    pub fn is_failure_sentinel(&self) -> bool {
        self.wns_ns == REPAIR_FAILURE_SENTINEL_NS
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Limits forwarded to check tools.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CheckLimits {
    pub drc_max_violations: u32,
    pub ir_drop_max_mv: f64,
    pub min_slack_ns: f64,
}

/// Raw result of one check invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CheckOutcome {
    pub violation_count: u32,
    pub details: Vec<String>,

    /// Worst IR drop (mV) or WNS (ns) for metric checks.
    #[serde(default)]
    pub metric: Option<f64>,

    /// LVS comparison verdict.
    #[serde(default)]
    pub circuits_match: Option<bool>,

    #[serde(default)]
    pub report_path: Option<String>,
}

impl CheckOutcome {
    pub fn with_count(violation_count: u32) -> Self {
        Self {
            violation_count,
            ..Default::default()
        }
    }

    pub fn with_metric(mut self, metric: f64) -> Self {
        self.metric = Some(metric);
        self
    }

    pub fn with_match(mut self, circuits_match: bool) -> Self {
        self.circuits_match = Some(circuits_match);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Adapter trait
// ---------------------------------------------------------------------------

/// Boundary to the external timing, repair and verification tools.
#[async_trait]
pub trait ToolchainAdapter: Send + Sync {
    /// Run static timing analysis and return the raw path report.
    async fn run_timing_analysis(
        &self,
        snapshot: &DesignSnapshot,
        path_type: PathType,
    ) -> Result<String, ToolchainError>;

    /// Apply physical repair (or only measure, see [`RepairOptions::measure_only`]).
    ///
    /// Mutates the design state held by the tool.
    async fn apply_repair(
        &self,
        snapshot: &DesignSnapshot,
        options: &RepairOptions,
    ) -> Result<RepairOutcome, ToolchainError>;

    /// Run one signoff check.
    async fn run_check(
        &self,
        check: CheckKind,
        snapshot: &DesignSnapshot,
        limits: &CheckLimits,
    ) -> Result<CheckOutcome, ToolchainError>;
}

/// Await `fut` for at most `secs` seconds. `0` disables the bound.
pub async fn with_timeout<T, F>(operation: &str, secs: u64, fut: F) -> Result<T, ToolchainError>
where
    F: Future<Output = Result<T, ToolchainError>>,
{
    if secs == 0 {
        return fut.await;
    }
    tokio::time::timeout(Duration::from_secs(secs), fut)
        .await
        .map_err(|_| ToolchainError::Timeout {
            operation: operation.to_string(),
            after_secs: secs,
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_only_disables_every_transform() {
        let opts = RepairOptions::measure_only();
        assert!(opts.is_measure_only());
        assert!(!opts.enable_gate_sizing);
        assert!(!opts.enable_buffer_insertion);
    }

    #[test]
    fn test_sentinel_detection() {
        let failed = RepairOutcome {
            wns_ns: REPAIR_FAILURE_SENTINEL_NS,
            tns_ns: 0.0,
            changes_applied: 0,
        };
        let genuine = RepairOutcome {
            wns_ns: -12.0,
            tns_ns: -300.0,
            changes_applied: 0,
        };
        assert!(failed.is_failure_sentinel());
        assert!(!genuine.is_failure_sentinel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let result: Result<(), ToolchainError> = with_timeout("sta", 1, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ToolchainError::Timeout { after_secs: 1, .. })));
    }

    #[tokio::test]
    async fn test_with_timeout_zero_is_unbounded() {
        let result = with_timeout("sta", 0, async { Ok::<_, ToolchainError>(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn test_snapshot_deserializes_with_defaults() {
        let json = r#"{"name":"top","run_dir":"runs/r1"}"#;
        let snap: DesignSnapshot = serde_json::from_str(json).expect("deserialize");
        assert_eq!(snap.name, "top");
        assert!(snap.odb.is_none());
        assert!(snap.liberty.is_empty());
    }
}
