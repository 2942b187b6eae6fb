//! Fix recommender: maps timing violations to prioritized ECO fixes.
//!
//! Pure and deterministic. Severity thresholds live in ordered rule tables
//! (first matching predicate wins) so they can be audited and recalibrated in
//! one place. Severity is `|slack|` in ns; estimates are reported in ps.

use crate::config::EcoConfig;
use crate::domain::eco::{EcoAction, EcoFix, FixPriority, RepairCommand};
use crate::domain::timing::{PathType, TimingViolation};

/// Ordered `(predicate, outcome)` pair. The first matching predicate wins.
pub(crate) type Rule<T> = (fn(f64) -> bool, T);

pub(crate) fn first_match<T: Copy>(rules: &[Rule<T>], value: f64) -> Option<T> {
    rules
        .iter()
        .find(|(predicate, _)| predicate(value))
        .map(|(_, outcome)| *outcome)
}

// ---------------------------------------------------------------------------
// Rule tables
// ---------------------------------------------------------------------------

const GATE_RESIZE_PRIORITY: &[Rule<FixPriority>] = &[
    (|s| s > 0.5, FixPriority::Critical),
    (|s| s > 0.2, FixPriority::High),
    (|_| true, FixPriority::Medium),
];

const VT_SWAP_PRIORITY: &[Rule<FixPriority>] = &[(|s| s > 0.1, FixPriority::Medium)];

const PIN_SWAP_PRIORITY: &[Rule<FixPriority>] = &[(|_| true, FixPriority::Low)];

const CLONE_GATE_PRIORITY: &[Rule<FixPriority>] = &[(|s| s > 1.0, FixPriority::High)];

const BUFFER_INSERT_PRIORITY: &[Rule<FixPriority>] = &[
    (|s| s > 0.1, FixPriority::Critical),
    (|_| true, FixPriority::High),
];

/// Recovery model per action: `min(severity_ps * factor, cap_ps)`.
struct Estimate {
    factor: f64,
    cap_ps: f64,
}

impl Estimate {
    fn apply(&self, severity_ns: f64) -> f64 {
        (severity_ns * 1000.0 * self.factor).min(self.cap_ps)
    }
}

const GATE_RESIZE_ESTIMATE: Estimate = Estimate {
    factor: 0.3,
    cap_ps: 100.0,
};
const VT_SWAP_ESTIMATE: Estimate = Estimate {
    factor: 0.2,
    cap_ps: 50.0,
};
const PIN_SWAP_ESTIMATE: Estimate = Estimate {
    factor: 0.1,
    cap_ps: 20.0,
};
const CLONE_GATE_ESTIMATE: Estimate = Estimate {
    factor: 0.15,
    cap_ps: 40.0,
};
/// Hold buffering recovers the full violation.
const BUFFER_INSERT_ESTIMATE: Estimate = Estimate {
    factor: 1.0,
    cap_ps: f64::INFINITY,
};

struct FixRule {
    action: EcoAction,
    path_type: PathType,
    enabled: fn(&EcoConfig) -> bool,
    priority: &'static [Rule<FixPriority>],
    estimate: Estimate,
}

/// Emission order per violation. A fix is emitted only when its flag is on and
/// its priority table yields an outcome.
const FIX_RULES: &[FixRule] = &[
    FixRule {
        action: EcoAction::GateResize,
        path_type: PathType::Setup,
        enabled: |c| c.enable_gate_sizing,
        priority: GATE_RESIZE_PRIORITY,
        estimate: GATE_RESIZE_ESTIMATE,
    },
    FixRule {
        action: EcoAction::VtSwap,
        path_type: PathType::Setup,
        enabled: |c| c.enable_vt_swap,
        priority: VT_SWAP_PRIORITY,
        estimate: VT_SWAP_ESTIMATE,
    },
    FixRule {
        action: EcoAction::PinSwap,
        path_type: PathType::Setup,
        enabled: |c| c.enable_pin_swap,
        priority: PIN_SWAP_PRIORITY,
        estimate: PIN_SWAP_ESTIMATE,
    },
    FixRule {
        action: EcoAction::CloneGate,
        path_type: PathType::Setup,
        enabled: |c| c.enable_gate_cloning,
        priority: CLONE_GATE_PRIORITY,
        estimate: CLONE_GATE_ESTIMATE,
    },
    FixRule {
        action: EcoAction::BufferInsert,
        path_type: PathType::Hold,
        enabled: |c| c.enable_buffer_insertion,
        priority: BUFFER_INSERT_PRIORITY,
        estimate: BUFFER_INSERT_ESTIMATE,
    },
];

// ---------------------------------------------------------------------------
// Repair descriptors
// ---------------------------------------------------------------------------

fn repair_command(action: EcoAction, config: &EcoConfig) -> RepairCommand {
    let setup = |sequence: &str| {
        RepairCommand::new(
            "repair_timing",
            vec![
                "-setup".to_string(),
                "-setup_margin".to_string(),
                format!("{}", config.setup_margin_ns),
                "-sequence".to_string(),
                sequence.to_string(),
            ],
        )
    };
    match action {
        EcoAction::GateResize => setup("sizeup"),
        EcoAction::VtSwap => setup("vt_swap"),
        EcoAction::PinSwap => setup("swap_pins"),
        EcoAction::CloneGate => setup("clone"),
        EcoAction::BufferInsert => RepairCommand::new(
            "repair_timing",
            vec![
                "-hold".to_string(),
                "-hold_margin".to_string(),
                format!("{}", config.hold_margin_ns),
                "-max_utilization".to_string(),
                format!("{}", config.max_utilization_pct),
            ],
        ),
    }
}

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

/// Recommend fixes for `violations`, stable-sorted by priority
/// (`critical < high < medium < low`), input order kept within a priority.
///
/// A disabled fix class never appears in the output.
pub fn recommend_fixes(violations: &[TimingViolation], config: &EcoConfig) -> Vec<EcoFix> {
    let mut fixes = Vec::new();
    for violation in violations {
        if violation.slack_ns >= 0.0 {
            continue;
        }
        let severity = violation.severity_ns();
        for rule in FIX_RULES {
            if rule.path_type != violation.path_type || !(rule.enabled)(config) {
                continue;
            }
            let Some(priority) = first_match(rule.priority, severity) else {
                continue;
            };
            fixes.push(EcoFix {
                action: rule.action,
                location: violation.endpoint.clone(),
                clock: violation.clock.clone(),
                estimated_improvement_ps: rule.estimate.apply(severity),
                priority,
                repair: repair_command(rule.action, config),
            });
        }
    }
    fixes.sort_by_key(|f| f.priority);
    fixes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(endpoint: &str, slack: f64) -> TimingViolation {
        TimingViolation::new(PathType::Setup, "in", endpoint, slack)
    }

    fn hold(endpoint: &str, slack: f64) -> TimingViolation {
        TimingViolation::new(PathType::Hold, "in", endpoint, slack)
    }

    fn actions(fixes: &[EcoFix]) -> Vec<EcoAction> {
        fixes.iter().map(|f| f.action).collect()
    }

    #[test]
    fn test_first_match_falls_through_to_none() {
        assert_eq!(first_match(VT_SWAP_PRIORITY, 0.05), None);
        assert_eq!(first_match(VT_SWAP_PRIORITY, 0.15), Some(FixPriority::Medium));
        assert_eq!(first_match(GATE_RESIZE_PRIORITY, 0.3), Some(FixPriority::High));
    }

    #[test]
    fn test_gate_resize_priority_boundaries() {
        let config = EcoConfig::default();
        let at = |slack: f64| {
            recommend_fixes(&[setup("r1/D", slack)], &config)
                .into_iter()
                .find(|f| f.action == EcoAction::GateResize)
                .map(|f| f.priority)
        };
        assert_eq!(at(-0.51), Some(FixPriority::Critical));
        assert_eq!(at(-0.5), Some(FixPriority::High));
        assert_eq!(at(-0.21), Some(FixPriority::High));
        assert_eq!(at(-0.2), Some(FixPriority::Medium));
    }

    #[test]
    fn test_small_setup_violation_skips_vt_swap() {
        let fixes = recommend_fixes(&[setup("r1/D", -0.05)], &EcoConfig::default());
        assert_eq!(actions(&fixes), vec![EcoAction::GateResize, EcoAction::PinSwap]);
    }

    #[test]
    fn test_estimates_are_capped() {
        let fixes = recommend_fixes(&[setup("r1/D", -2.0)], &EcoConfig::default());
        let by = |a: EcoAction| {
            fixes
                .iter()
                .find(|f| f.action == a)
                .map(|f| f.estimated_improvement_ps)
        };
        assert_eq!(by(EcoAction::GateResize), Some(100.0));
        assert_eq!(by(EcoAction::VtSwap), Some(50.0));
        assert_eq!(by(EcoAction::PinSwap), Some(20.0));

        let fixes = recommend_fixes(&[setup("r1/D", -0.1)], &EcoConfig::default());
        assert!((fixes[0].estimated_improvement_ps - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_hold_buffer_priority_and_estimate() {
        let violations = [hold("r2/D", -0.15), hold("r3/D", -0.05)];
        let fixes = recommend_fixes(&violations, &EcoConfig::default());
        assert_eq!(fixes.len(), 2);
        assert_eq!(fixes[0].priority, FixPriority::Critical);
        assert!((fixes[0].estimated_improvement_ps - 150.0).abs() < 1e-9);
        assert_eq!(fixes[1].priority, FixPriority::High);
        assert!(fixes[1].repair.to_tcl().starts_with("repair_timing -hold"));
    }

    #[test]
    fn test_clone_gate_is_opt_in() {
        let violations = [setup("r1/D", -1.5)];
        let default = recommend_fixes(&violations, &EcoConfig::default());
        assert!(!default.iter().any(|f| f.action == EcoAction::CloneGate));

        let config = EcoConfig {
            enable_gate_cloning: true,
            ..Default::default()
        };
        let fixes = recommend_fixes(&violations, &config);
        let clone = fixes
            .iter()
            .find(|f| f.action == EcoAction::CloneGate)
            .expect("clone_gate emitted");
        assert_eq!(clone.priority, FixPriority::High);
        assert_eq!(clone.estimated_improvement_ps, 40.0);
        assert!(clone.repair.to_tcl().ends_with("-sequence clone"));
    }

    #[test]
    fn test_fix_carries_endpoint_and_clock() {
        let v = setup("core/r7/D", -0.3).with_clock("clk_core");
        let fixes = recommend_fixes(&[v], &EcoConfig::default());
        assert!(fixes.iter().all(|f| f.location == "core/r7/D"));
        assert!(fixes.iter().all(|f| f.clock.as_deref() == Some("clk_core")));
    }

    #[test]
    fn test_non_negative_slack_is_ignored() {
        assert!(recommend_fixes(&[setup("r1/D", 0.0)], &EcoConfig::default()).is_empty());
    }
}
