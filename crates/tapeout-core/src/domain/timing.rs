//! Timing violation records produced by the violation analyzer.

use serde::{Deserialize, Serialize};

/// Which static-timing check a path failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PathType {
    /// Max-delay check: data arrives too late.
    Setup,
    /// Min-delay check: data arrives too early.
    Hold,
}

impl PathType {
    /// OpenSTA `-path_delay` argument for this check.
    pub fn path_delay(&self) -> &'static str {
        match self {
            PathType::Setup => "max",
            PathType::Hold => "min",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PathType::Setup => "setup",
            PathType::Hold => "hold",
        }
    }
}

/// A single failing timing path (negative slack).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingViolation {
    pub path_type: PathType,

    /// Launching pin or instance.
    pub startpoint: String,

    /// Capturing pin or instance.
    pub endpoint: String,

    /// Slack in nanoseconds; negative for a violation.
    pub slack_ns: f64,

    /// Capture clock, when the report names one.
    pub clock: Option<String>,
}

impl TimingViolation {
    pub fn new(
        path_type: PathType,
        startpoint: impl Into<String>,
        endpoint: impl Into<String>,
        slack_ns: f64,
    ) -> Self {
        Self {
            path_type,
            startpoint: startpoint.into(),
            endpoint: endpoint.into(),
            slack_ns,
            clock: None,
        }
    }

    pub fn with_clock(mut self, clock: impl Into<String>) -> Self {
        self.clock = Some(clock.into());
        self
    }

    /// Violation magnitude, `|slack|` in nanoseconds.
    pub fn severity_ns(&self) -> f64 {
        self.slack_ns.abs()
    }
}

/// Worst and total negative slack for one measurement, in nanoseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TimingMeasurement {
    pub wns_ns: f64,
    pub tns_ns: f64,
}

impl TimingMeasurement {
    pub fn new(wns_ns: f64, tns_ns: f64) -> Self {
        Self { wns_ns, tns_ns }
    }
}
