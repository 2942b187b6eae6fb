//! Engine configuration: ECO loop, signoff battery and checklist overrides.
//!
//! Every section is `#[serde(default)]`, so a config file only needs the keys
//! it changes. [`TapeoutConfig::load`] accepts TOML or JSON by extension and
//! validates before returning; invalid values never reach a toolchain call.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::error::{ConfigError, Result, TapeoutError};
use crate::domain::signoff::CheckKind;
use crate::readiness;
use crate::toolchain::{CheckLimits, RepairOptions};

const MAX_ITERATIONS_LIMIT: u32 = 100;

// ---------------------------------------------------------------------------
// ECO
// ---------------------------------------------------------------------------

/// Convergence loop and fix recommender policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EcoConfig {
    /// Upper bound on repair iterations.
    pub max_iterations: u32,
    pub setup_margin_ns: f64,
    pub hold_margin_ns: f64,
    /// Placement utilization ceiling for repair, in percent.
    pub max_utilization_pct: f64,
    pub enable_gate_sizing: bool,
    pub enable_vt_swap: bool,
    pub enable_pin_swap: bool,
    pub enable_buffer_insertion: bool,
    pub enable_gate_cloning: bool,
    /// WNS at or above which timing counts as met.
    pub target_wns_ns: f64,
    pub stop_on_convergence: bool,
    /// Budget for one repair invocation; 0 disables the bound.
    pub iteration_timeout_secs: u64,
    /// Consecutive failed iterations tolerated before the loop gives up.
    pub max_consecutive_failures: u32,
}

impl Default for EcoConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            setup_margin_ns: 0.0,
            hold_margin_ns: 0.0,
            max_utilization_pct: 80.0,
            enable_gate_sizing: true,
            enable_vt_swap: true,
            enable_pin_swap: true,
            enable_buffer_insertion: true,
            enable_gate_cloning: false,
            target_wns_ns: 0.0,
            stop_on_convergence: true,
            iteration_timeout_secs: 1800,
            max_consecutive_failures: 2,
        }
    }
}

impl EcoConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.max_iterations == 0 || self.max_iterations > MAX_ITERATIONS_LIMIT {
            return Err(ConfigError::OutOfRange {
                field: "max_iterations",
                value: self.max_iterations.to_string(),
                expected: "1..=100",
            });
        }
        for (field, value) in [
            ("setup_margin_ns", self.setup_margin_ns),
            ("hold_margin_ns", self.hold_margin_ns),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::OutOfRange {
                    field,
                    value: value.to_string(),
                    expected: "finite and >= 0",
                });
            }
        }
        if !(self.max_utilization_pct > 0.0 && self.max_utilization_pct <= 100.0) {
            return Err(ConfigError::OutOfRange {
                field: "max_utilization_pct",
                value: self.max_utilization_pct.to_string(),
                expected: "(0, 100]",
            });
        }
        if !self.target_wns_ns.is_finite() {
            return Err(ConfigError::OutOfRange {
                field: "target_wns_ns",
                value: self.target_wns_ns.to_string(),
                expected: "finite",
            });
        }
        if self.max_consecutive_failures == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_consecutive_failures",
                value: "0".to_string(),
                expected: ">= 1",
            });
        }
        if !(self.enable_gate_sizing
            || self.enable_vt_swap
            || self.enable_pin_swap
            || self.enable_buffer_insertion
            || self.enable_gate_cloning)
        {
            return Err(ConfigError::Contradictory(
                "every repair transform is disabled; the ECO loop cannot make progress"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Options for one repair iteration: setup and hold repair with the
    /// configured transforms.
    pub fn repair_options(&self) -> RepairOptions {
        RepairOptions {
            repair_setup: true,
            repair_hold: true,
            setup_margin_ns: self.setup_margin_ns,
            hold_margin_ns: self.hold_margin_ns,
            max_utilization_pct: self.max_utilization_pct,
            enable_gate_sizing: self.enable_gate_sizing,
            enable_vt_swap: self.enable_vt_swap,
            enable_pin_swap: self.enable_pin_swap,
            enable_buffer_insertion: self.enable_buffer_insertion,
            enable_gate_cloning: self.enable_gate_cloning,
        }
    }
}

// ---------------------------------------------------------------------------
// Signoff
// ---------------------------------------------------------------------------

/// Signoff battery selection and pass/fail limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SignoffConfig {
    pub enabled_checks: Vec<CheckKind>,
    /// DRC counts up to this value are a warning; above it a failure.
    pub drc_max_violations: u32,
    pub ir_drop_max_mv: f64,
    pub min_slack_ns: f64,
    /// Budget per check; 0 disables the bound.
    pub check_timeout_secs: u64,
    /// Run checks concurrently. Results are joined before aggregation.
    pub parallel: bool,
}

impl Default for SignoffConfig {
    fn default() -> Self {
        Self {
            enabled_checks: CheckKind::ALL.to_vec(),
            drc_max_violations: 0,
            ir_drop_max_mv: 50.0,
            min_slack_ns: 0.0,
            check_timeout_secs: 3600,
            parallel: false,
        }
    }
}

impl SignoffConfig {
    /// Config with exactly the given checks enabled.
    pub fn only(checks: &[CheckKind]) -> Self {
        Self {
            enabled_checks: checks.to_vec(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.enabled_checks.is_empty() {
            return Err(ConfigError::NoChecksEnabled);
        }
        let mut seen = HashSet::new();
        for check in &self.enabled_checks {
            if !seen.insert(*check) {
                return Err(ConfigError::Contradictory(format!(
                    "check '{}' enabled more than once",
                    check.name()
                )));
            }
        }
        if !(self.ir_drop_max_mv.is_finite() && self.ir_drop_max_mv > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "ir_drop_max_mv",
                value: self.ir_drop_max_mv.to_string(),
                expected: "finite and > 0",
            });
        }
        if !self.min_slack_ns.is_finite() {
            return Err(ConfigError::OutOfRange {
                field: "min_slack_ns",
                value: self.min_slack_ns.to_string(),
                expected: "finite",
            });
        }
        Ok(())
    }

    pub fn limits(&self) -> CheckLimits {
        CheckLimits {
            drc_max_violations: self.drc_max_violations,
            ir_drop_max_mv: self.ir_drop_max_mv,
            min_slack_ns: self.min_slack_ns,
        }
    }
}

// ---------------------------------------------------------------------------
// Checklist
// ---------------------------------------------------------------------------

/// Per-project checklist requirements. Overrides may change whether an item
/// is required, never its weight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ChecklistConfig {
    /// Run directory searched for evidence; the command line may override it.
    pub run_dir: Option<PathBuf>,
    pub required_overrides: BTreeMap<String, bool>,
}

impl ChecklistConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        for id in self.required_overrides.keys() {
            if readiness::template(id).is_none() {
                return Err(ConfigError::UnknownChecklistItem(id.clone()));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct TapeoutConfig {
    pub eco: EcoConfig,
    pub signoff: SignoffConfig,
    pub checklist: ChecklistConfig,
}

impl TapeoutConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.eco.validate()?;
        self.signoff.validate()?;
        self.checklist.validate()
    }

    /// Load and validate a TOML or JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let config: TapeoutConfig = load_file(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Deserialize a TOML (`.toml`) or JSON (anything else) file.
pub fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    let is_toml = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    if is_toml {
        toml::from_str(&text)
            .map_err(|e| TapeoutError::ConfigFormat(format!("{}: {}", path.display(), e)))
    } else {
        Ok(serde_json::from_str(&text)?)
    }
}
