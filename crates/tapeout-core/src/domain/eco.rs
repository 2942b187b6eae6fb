//! Engineering-change-order (ECO) fixes and optimizer outcomes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::timing::TimingViolation;

/// Physical repair transform proposed for a failing path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EcoAction {
    BufferInsert,
    GateResize,
    VtSwap,
    PinSwap,
    CloneGate,
}

impl EcoAction {
    pub fn name(&self) -> &'static str {
        match self {
            EcoAction::BufferInsert => "buffer_insert",
            EcoAction::GateResize => "gate_resize",
            EcoAction::VtSwap => "vt_swap",
            EcoAction::PinSwap => "pin_swap",
            EcoAction::CloneGate => "clone_gate",
        }
    }
}

/// Fix priority. Ordering follows urgency: `Critical < High < Medium < Low`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FixPriority {
    Critical,
    High,
    Medium,
    Low,
}

/// Repair command descriptor handed to the physical-design tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepairCommand {
    /// Command name (e.g. `repair_timing`).
    pub command: String,

    /// Arguments in invocation order.
    pub args: Vec<String>,
}

impl RepairCommand {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Render as a single TCL command line.
    pub fn to_tcl(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// One recommended ECO fix. Derived fresh each pass, never cached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EcoFix {
    pub action: EcoAction,

    /// Instance or pin the fix targets (the violating endpoint).
    pub location: String,

    /// Clock domain of the violating path, if known.
    pub clock: Option<String>,

    /// Expected slack recovery in picoseconds.
    pub estimated_improvement_ps: f64,

    pub priority: FixPriority,

    pub repair: RepairCommand,
}

/// Why an iteration produced no usable measurement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IterationFailureKind {
    /// The tool could not be run or exited non-zero.
    Invocation,
    /// The iteration exceeded its time budget.
    Timeout,
    /// The adapter returned the failure sentinel instead of a measurement.
    Sentinel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IterationFailure {
    pub kind: IterationFailureKind,
    pub message: String,
}

/// Snapshot of one repair/measure iteration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EcoIterationResult {
    /// 1-based iteration number.
    pub iteration: u32,
    pub before_wns_ns: f64,
    pub after_wns_ns: f64,
    pub before_tns_ns: f64,
    pub after_tns_ns: f64,
    pub fixes_applied: u32,
    pub converged: bool,
    pub duration_ms: u64,

    /// Set when the repair invocation did not yield a measurement.
    #[serde(default)]
    pub failure: Option<IterationFailure>,
}

impl EcoIterationResult {
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }

    /// `before - after` WNS. Negative values are regressions and are kept as such.
    pub fn wns_delta_ns(&self) -> f64 {
        self.before_wns_ns - self.after_wns_ns
    }
}

/// Terminal state of the convergence loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// WNS stopped moving or no fixes could be applied.
    Converged,
    /// WNS reached the target.
    TargetMet,
    /// Iteration budget exhausted.
    MaxIterationsReached,
    /// Too many consecutive failed repair invocations.
    ToolFailure,
}

/// Aggregate outcome of one optimizer call. Immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EcoResult {
    pub run_id: Uuid,
    pub design: String,
    pub iterations: Vec<EcoIterationResult>,
    pub total_fixes_applied: u32,
    pub initial_wns_ns: f64,
    pub final_wns_ns: f64,
    pub initial_tns_ns: f64,
    pub final_tns_ns: f64,
    pub timing_met: bool,
    /// Set once any iteration stalls or meets the target.
    pub converged: bool,
    pub stop_reason: StopReason,
    pub duration_ms: u64,

    /// Outstanding fixes; always empty when timing was met.
    pub remaining_recommendations: Vec<EcoFix>,

    /// Violations seen by the closing analysis pass.
    pub remaining_violations: Vec<TimingViolation>,

    /// False when the closing analysis could not read its reports, in which
    /// case an empty recommendation list means "unknown", not "clean".
    pub analysis_conclusive: bool,
}

impl EcoResult {
    /// `timing_met || converged`.
    ///
    /// A run that stalled short of the target still reports success because
    /// no further automatic progress is possible. Callers that need closure
    /// must check `timing_met`.
    pub fn success(&self) -> bool {
        self.timing_met || self.converged
    }

    /// Final WNS minus initial WNS; positive means timing improved.
    pub fn wns_improvement_ns(&self) -> f64 {
        self.final_wns_ns - self.initial_wns_ns
    }

    pub fn failed_iterations(&self) -> usize {
        self.iterations.iter().filter(|i| i.failed()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(FixPriority::Critical < FixPriority::High);
        assert!(FixPriority::High < FixPriority::Medium);
        assert!(FixPriority::Medium < FixPriority::Low);
    }

    #[test]
    fn test_repair_command_to_tcl() {
        let cmd = RepairCommand::new(
            "repair_timing",
            vec!["-setup".to_string(), "-sequence".to_string(), "sizeup".to_string()],
        );
        assert_eq!(cmd.to_tcl(), "repair_timing -setup -sequence sizeup");
        assert_eq!(RepairCommand::new("report_wns", vec![]).to_tcl(), "report_wns");
    }

    #[test]
    fn test_iteration_regression_is_representable() {
        let it = EcoIterationResult {
            iteration: 2,
            before_wns_ns: -0.20,
            after_wns_ns: -0.35,
            before_tns_ns: -1.0,
            after_tns_ns: -1.4,
            fixes_applied: 3,
            converged: false,
            duration_ms: 10,
            failure: None,
        };
        assert!(it.wns_delta_ns() > 0.0, "worse WNS shows as positive delta");
        assert!(it.after_wns_ns < it.before_wns_ns);
    }

    #[test]
    fn test_eco_action_serde_names() {
        for action in [
            EcoAction::BufferInsert,
            EcoAction::GateResize,
            EcoAction::VtSwap,
            EcoAction::PinSwap,
            EcoAction::CloneGate,
        ] {
            let json = serde_json::to_string(&action).expect("serialize");
            assert_eq!(json, format!("\"{}\"", action.name()));
        }
    }
}
