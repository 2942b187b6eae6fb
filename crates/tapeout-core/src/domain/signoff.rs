//! Signoff check outcomes and the aggregate signoff report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The independent checks in the signoff battery.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Drc,
    Lvs,
    Antenna,
    IrDrop,
    Timing,
}

impl CheckKind {
    pub const ALL: [CheckKind; 5] = [
        CheckKind::Drc,
        CheckKind::Lvs,
        CheckKind::Antenna,
        CheckKind::IrDrop,
        CheckKind::Timing,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CheckKind::Drc => "drc",
            CheckKind::Lvs => "lvs",
            CheckKind::Antenna => "antenna",
            CheckKind::IrDrop => "ir_drop",
            CheckKind::Timing => "timing",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CheckKind::Drc => "DRC",
            CheckKind::Lvs => "LVS",
            CheckKind::Antenna => "Antenna",
            CheckKind::IrDrop => "IR drop",
            CheckKind::Timing => "Timing",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Warning,
    Skipped,
    /// The tool could not produce a verdict. Never equivalent to `Pass`.
    Error,
}

impl CheckStatus {
    pub fn is_blocking(&self) -> bool {
        matches!(self, CheckStatus::Fail | CheckStatus::Error)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckFailureKind {
    Invocation,
    Timeout,
    /// The tool ran but its output carried no usable measurement.
    MissingMeasurement,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckFailure {
    pub kind: CheckFailureKind,
    pub message: String,
}

/// Outcome of one signoff check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignoffCheckResult {
    pub check: CheckKind,
    pub status: CheckStatus,
    pub violation_count: u32,
    pub details: Vec<String>,
    pub duration_ms: u64,
    pub report_path: Option<String>,

    /// Worst measured value for metric checks (IR drop mV, WNS ns).
    #[serde(default)]
    pub metric: Option<f64>,

    /// Present only when `status == Error`.
    #[serde(default)]
    pub failure: Option<CheckFailure>,
}

impl SignoffCheckResult {
    pub fn name(&self) -> &'static str {
        self.check.name()
    }

    pub fn errored(check: CheckKind, failure: CheckFailure, duration_ms: u64) -> Self {
        Self {
            check,
            status: CheckStatus::Error,
            violation_count: 0,
            details: vec![failure.message.clone()],
            duration_ms,
            report_path: None,
            metric: None,
            failure: Some(failure),
        }
    }
}

/// Aggregate of every enabled check against one design snapshot.
///
/// `overall_status`, `tapeout_ready`, `blockers` and `warnings` are derived
/// from `checks` on construction and recomputed on deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "SignoffReportRecord")]
pub struct SignoffReport {
    run_id: Uuid,
    design: String,
    started_at: DateTime<Utc>,
    duration_ms: u64,
    checks: Vec<SignoffCheckResult>,
    overall_status: CheckStatus,
    tapeout_ready: bool,
    blockers: Vec<String>,
    warnings: Vec<String>,
}

/// Wire form of a report; derived fields are ignored on read.
#[derive(Deserialize)]
struct SignoffReportRecord {
    run_id: Uuid,
    design: String,
    started_at: DateTime<Utc>,
    #[serde(default)]
    duration_ms: u64,
    checks: Vec<SignoffCheckResult>,
}

impl From<SignoffReportRecord> for SignoffReport {
    fn from(r: SignoffReportRecord) -> Self {
        Self::new(r.run_id, r.design, r.started_at, r.duration_ms, r.checks)
    }
}

/// Fold check statuses: any fail/error → fail, else any warning → warning, else pass.
pub fn derive_overall_status(checks: &[SignoffCheckResult]) -> CheckStatus {
    if checks.iter().any(|c| c.status.is_blocking()) {
        CheckStatus::Fail
    } else if checks.iter().any(|c| c.status == CheckStatus::Warning) {
        CheckStatus::Warning
    } else {
        CheckStatus::Pass
    }
}

impl SignoffReport {
    pub fn new(
        run_id: Uuid,
        design: String,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        checks: Vec<SignoffCheckResult>,
    ) -> Self {
        let overall_status = derive_overall_status(&checks);
        let mut blockers = Vec::new();
        let mut warnings = Vec::new();
        for c in &checks {
            let summary = c
                .details
                .first()
                .cloned()
                .unwrap_or_else(|| format!("{} violation(s)", c.violation_count));
            match c.status {
                CheckStatus::Fail => {
                    blockers.push(format!("{} failed: {}", c.check.display_name(), summary))
                }
                CheckStatus::Error => {
                    blockers.push(format!("{} errored: {}", c.check.display_name(), summary))
                }
                CheckStatus::Warning => {
                    warnings.push(format!("{}: {}", c.check.display_name(), summary))
                }
                CheckStatus::Pass | CheckStatus::Skipped => {}
            }
        }

        Self {
            run_id,
            design,
            started_at,
            duration_ms,
            checks,
            tapeout_ready: overall_status == CheckStatus::Pass,
            overall_status,
            blockers,
            warnings,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn design(&self) -> &str {
        &self.design
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn checks(&self) -> &[SignoffCheckResult] {
        &self.checks
    }

    pub fn check(&self, kind: CheckKind) -> Option<&SignoffCheckResult> {
        self.checks.iter().find(|c| c.check == kind)
    }

    pub fn overall_status(&self) -> CheckStatus {
        self.overall_status
    }

    pub fn tapeout_ready(&self) -> bool {
        self.tapeout_ready
    }

    pub fn blockers(&self) -> &[String] {
        &self.blockers
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
