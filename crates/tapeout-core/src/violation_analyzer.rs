//! Violation analyzer: turns timing reports into structured violations.
//!
//! The analyzer never fails. Adapter errors and unreadable reports are kept
//! as [`ParseOutcome`] values so callers can tell "no violations" apart from
//! "report unavailable" via [`TimingAnalysis::is_conclusive`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::timing::{PathType, TimingViolation};
use crate::report_parser::{parse_path_report, ParseOutcome};
use crate::toolchain::{DesignSnapshot, ToolchainAdapter};

/// Setup and hold analysis for one design snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingAnalysis {
    pub setup: ParseOutcome<Vec<TimingViolation>>,
    pub hold: ParseOutcome<Vec<TimingViolation>>,
}

impl TimingAnalysis {
    /// Build from raw report text (offline analysis).
    pub fn from_reports(setup_report: Option<&str>, hold_report: Option<&str>) -> Self {
        Self {
            setup: setup_report
                .map(|t| parse_path_report(t, PathType::Setup))
                .unwrap_or(ParseOutcome::Unavailable),
            hold: hold_report
                .map(|t| parse_path_report(t, PathType::Hold))
                .unwrap_or(ParseOutcome::Unavailable),
        }
    }

    /// All failing paths, setup first then hold, each in report order.
    ///
    /// Empty when nothing failed *or* when the reports were unavailable.
    pub fn violations(&self) -> Vec<TimingViolation> {
        let mut out = Vec::new();
        if let Some(v) = self.setup.as_parsed() {
            out.extend(v.iter().cloned());
        }
        if let Some(v) = self.hold.as_parsed() {
            out.extend(v.iter().cloned());
        }
        out
    }

    /// Both reports were read and parsed.
    pub fn is_conclusive(&self) -> bool {
        self.setup.is_parsed() && self.hold.is_parsed()
    }

    pub fn count(&self, path_type: PathType) -> usize {
        let outcome = match path_type {
            PathType::Setup => &self.setup,
            PathType::Hold => &self.hold,
        };
        outcome.as_parsed().map(Vec::len).unwrap_or(0)
    }
}

async fn analyze_path_type(
    adapter: &dyn ToolchainAdapter,
    snapshot: &DesignSnapshot,
    path_type: PathType,
) -> ParseOutcome<Vec<TimingViolation>> {
    let report = match adapter.run_timing_analysis(snapshot, path_type).await {
        Ok(text) => text,
        Err(e) => {
            warn!(
                design = %snapshot.name,
                path_type = path_type.name(),
                error = %e,
                "timing report unavailable"
            );
            return ParseOutcome::Unavailable;
        }
    };

    let outcome = parse_path_report(&report, path_type);
    match &outcome {
        ParseOutcome::Parsed(v) => {
            debug!(path_type = path_type.name(), violations = v.len(), "timing report parsed")
        }
        ParseOutcome::Malformed(reason) => warn!(
            design = %snapshot.name,
            path_type = path_type.name(),
            reason = %reason,
            "timing report did not match the expected format"
        ),
        ParseOutcome::Unavailable => {
            warn!(path_type = path_type.name(), "timing report empty")
        }
    }
    outcome
}

/// Query setup (max-delay) and hold (min-delay) reports through the adapter.
pub async fn analyze_timing(
    adapter: &dyn ToolchainAdapter,
    snapshot: &DesignSnapshot,
) -> TimingAnalysis {
    let setup = analyze_path_type(adapter, snapshot, PathType::Setup).await;
    let hold = analyze_path_type(adapter, snapshot, PathType::Hold).await;
    TimingAnalysis { setup, hold }
}

/// Ordered violation list; empty on any parse or adapter failure.
pub async fn analyze(
    adapter: &dyn ToolchainAdapter,
    snapshot: &DesignSnapshot,
) -> Vec<TimingViolation> {
    analyze_timing(adapter, snapshot).await.violations()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ToolchainError;
    use crate::fakes::FakeToolchain;

    const ONE_SETUP: &str = "Startpoint: a (input port clocked by clk)\nEndpoint: r1 (rising edge-triggered flip-flop clocked by clk)\n  -0.30   slack (VIOLATED)\n";
    const ONE_HOLD: &str = "Startpoint: r0 (rising edge-triggered flip-flop clocked by clk)\nEndpoint: r1 (rising edge-triggered flip-flop clocked by clk)\n  -0.02   slack (VIOLATED)\n";

    #[tokio::test]
    async fn test_setup_then_hold_ordering() {
        let fake = FakeToolchain::new()
            .with_timing_report(PathType::Setup, ONE_SETUP)
            .with_timing_report(PathType::Hold, ONE_HOLD);
        let snap = DesignSnapshot::new("top", "runs/r1");

        let analysis = analyze_timing(&fake, &snap).await;
        assert!(analysis.is_conclusive());
        let v = analysis.violations();
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].path_type, PathType::Setup);
        assert_eq!(v[1].path_type, PathType::Hold);
    }

    #[tokio::test]
    async fn test_adapter_failure_yields_empty_but_inconclusive() {
        let fake = FakeToolchain::new()
            .with_timing_error(PathType::Setup, ToolchainError::invocation("sta", "crash"))
            .with_timing_report(PathType::Hold, "No paths found.\n");
        let snap = DesignSnapshot::new("top", "runs/r1");

        let analysis = analyze_timing(&fake, &snap).await;
        assert!(analysis.violations().is_empty());
        assert!(!analysis.is_conclusive());
        assert_eq!(analysis.setup, ParseOutcome::Unavailable);

        assert!(analyze(&fake, &snap).await.is_empty());
    }

    #[test]
    fn test_from_reports_offline() {
        let analysis = TimingAnalysis::from_reports(Some(ONE_SETUP), None);
        assert_eq!(analysis.count(PathType::Setup), 1);
        assert_eq!(analysis.count(PathType::Hold), 0);
        assert!(!analysis.is_conclusive());
    }
}
