//! Typed parsers for timing, repair and verification tool output.
//!
//! All text patterns the engine relies on live here. A report that does not
//! match the expected shape comes back as [`ParseOutcome::Malformed`] rather
//! than an empty result, so format drift in a tool upgrade is visible at this
//! boundary.
//!
//! Supported formats:
//! - OpenSTA `report_checks` path reports
//! - OpenROAD `report_wns` / `report_tns`
//! - OpenROAD resizer (`repair_timing`) change counters
//! - Magic / OpenROAD DRT violation totals
//! - Netgen LVS verdicts
//! - OpenROAD `check_antennas`
//! - OpenROAD PSM `analyze_power_grid`

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::timing::{PathType, TimingMeasurement, TimingViolation};

/// Result of parsing one tool report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ParseOutcome<T> {
    /// Report recognised and parsed.
    Parsed(T),
    /// No report text was available.
    Unavailable,
    /// Report text present but not in the expected shape.
    Malformed(String),
}

impl<T> ParseOutcome<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseOutcome::Parsed(_))
    }

    pub fn parsed(self) -> Option<T> {
        match self {
            ParseOutcome::Parsed(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_parsed(&self) -> Option<&T> {
        match self {
            ParseOutcome::Parsed(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseOutcome<U> {
        match self {
            ParseOutcome::Parsed(v) => ParseOutcome::Parsed(f(v)),
            ParseOutcome::Unavailable => ParseOutcome::Unavailable,
            ParseOutcome::Malformed(reason) => ParseOutcome::Malformed(reason),
        }
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &'static str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static report pattern compiles"))
}

fn startpoint_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"^\s*Startpoint:\s+(\S+)(?:\s+\((.*)\))?")
}

fn endpoint_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"^\s*Endpoint:\s+(\S+)(?:\s+\((.*)\))?")
}

fn clocked_by_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"clocked by ([^\s)]+)")
}

fn path_group_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"^\s*Path Group:\s+(\S+)")
}

fn slack_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(
        &CELL,
        r"^\s*(-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)\s+slack\s+\((VIOLATED|MET)\)",
    )
}

fn summary_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(
        &CELL,
        r"(?mi)^\s*(wns|tns)\b(?:\s+(?:max|min))?\s*[:=]?\s+(-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)",
    )
}

fn repair_change_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(
        &CELL,
        r"(?i)\b(?:inserted|resized|swapped pins on|cloned|swapped)\s+(\d+)\b",
    )
}

fn drc_total_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(
        &CELL,
        r"(?i)(?:total\s+drc\s+errors(?:\s+found)?|number\s+of\s+violations)\s*[:=]\s*(\d+)",
    )
}

fn lvs_mismatch_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"(?i)(?:netlists|circuits)\s+do\s+not\s+match")
}

fn lvs_match_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"(?i)(?:netlists|circuits)\s+match\s+uniquely")
}

fn antenna_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(
        &CELL,
        r"(?i)(?:found\s+(\d+)\s+net\s+violations|number\s+of\s+nets\s+violated\s*:\s*(\d+))",
    )
}

fn ir_drop_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(
        &CELL,
        r"(?i)worst\s*(?:case)?\s+ir\s+drop\s*:?\s*(\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)\s*(mv|v)\b",
    )
}

// ---------------------------------------------------------------------------
// Path reports
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PathBlock {
    startpoint: String,
    endpoint: Option<String>,
    clock: Option<String>,
    group: Option<String>,
}

/// Parse an OpenSTA `report_checks` report into failing paths, tagged with
/// `path_type` and kept in report order.
pub fn parse_path_report(text: &str, path_type: PathType) -> ParseOutcome<Vec<TimingViolation>> {
    if text.trim().is_empty() {
        return ParseOutcome::Unavailable;
    }

    let mut violations = Vec::new();
    let mut current: Option<PathBlock> = None;
    let mut blocks_seen = 0usize;

    for line in text.lines() {
        if let Some(caps) = startpoint_re().captures(line) {
            if let Some(open) = current.take() {
                return ParseOutcome::Malformed(format!(
                    "path from '{}' has no slack line",
                    open.startpoint
                ));
            }
            let mut block = PathBlock {
                startpoint: caps[1].to_string(),
                ..Default::default()
            };
            if let Some(desc) = caps.get(2) {
                block.clock = clocked_by_re()
                    .captures(desc.as_str())
                    .map(|c| c[1].to_string());
            }
            current = Some(block);
            continue;
        }

        if let Some(caps) = endpoint_re().captures(line) {
            if let Some(block) = current.as_mut() {
                block.endpoint = Some(caps[1].to_string());
                if let Some(clock) = caps
                    .get(2)
                    .and_then(|d| clocked_by_re().captures(d.as_str()))
                {
                    block.clock = Some(clock[1].to_string());
                }
            }
            continue;
        }

        if let Some(caps) = path_group_re().captures(line) {
            if let Some(block) = current.as_mut() {
                block.group = Some(caps[1].to_string());
            }
            continue;
        }

        if let Some(caps) = slack_re().captures(line) {
            let Some(block) = current.take() else {
                return ParseOutcome::Malformed("slack line outside a path block".to_string());
            };
            let Ok(slack) = caps[1].parse::<f64>() else {
                return ParseOutcome::Malformed(format!("unparseable slack '{}'", &caps[1]));
            };
            let Some(endpoint) = block.endpoint else {
                return ParseOutcome::Malformed(format!(
                    "path from '{}' has no endpoint",
                    block.startpoint
                ));
            };
            blocks_seen += 1;
            if slack < 0.0 {
                violations.push(TimingViolation {
                    path_type,
                    startpoint: block.startpoint,
                    endpoint,
                    slack_ns: slack,
                    clock: block.clock.or(block.group),
                });
            }
        }
    }

    if let Some(open) = current {
        return ParseOutcome::Malformed(format!(
            "path from '{}' has no slack line",
            open.startpoint
        ));
    }
    if blocks_seen == 0 && !text.contains("No paths found") {
        return ParseOutcome::Malformed(
            "no path blocks and no 'No paths found' marker".to_string(),
        );
    }

    ParseOutcome::Parsed(violations)
}

// ---------------------------------------------------------------------------
// Summaries and repair logs
// ---------------------------------------------------------------------------

/// Parse `report_wns` / `report_tns` lines. Both values must be present.
pub fn parse_timing_summary(text: &str) -> ParseOutcome<TimingMeasurement> {
    if text.trim().is_empty() {
        return ParseOutcome::Unavailable;
    }

    let mut wns = None;
    let mut tns = None;
    for caps in summary_re().captures_iter(text) {
        let value = match caps[2].parse::<f64>() {
            Ok(v) => v,
            Err(_) => return ParseOutcome::Malformed(format!("unparseable value '{}'", &caps[2])),
        };
        match caps[1].to_ascii_lowercase().as_str() {
            "wns" => wns = Some(value),
            _ => tns = Some(value),
        }
    }

    match (wns, tns) {
        (Some(w), Some(t)) => ParseOutcome::Parsed(TimingMeasurement::new(w, t)),
        (None, _) => ParseOutcome::Malformed("missing wns line".to_string()),
        (_, None) => ParseOutcome::Malformed("missing tns line".to_string()),
    }
}

/// Total design changes reported by the resizer (buffers, resizes, swaps, clones).
pub fn parse_repair_changes(text: &str) -> u32 {
    repair_change_re()
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .sum()
}

// ---------------------------------------------------------------------------
// Verification reports
// ---------------------------------------------------------------------------

/// Final DRC violation total. The last reported total wins.
pub fn parse_drc_count(text: &str) -> ParseOutcome<u32> {
    if text.trim().is_empty() {
        return ParseOutcome::Unavailable;
    }
    match drc_total_re()
        .captures_iter(text)
        .last()
        .map(|c| c[1].parse::<u32>())
    {
        Some(Ok(n)) => ParseOutcome::Parsed(n),
        Some(Err(e)) => ParseOutcome::Malformed(format!("bad DRC total: {e}")),
        None => ParseOutcome::Malformed("no DRC violation total found".to_string()),
    }
}

/// LVS verdict: `true` when the netlists match.
pub fn parse_lvs_match(text: &str) -> ParseOutcome<bool> {
    if text.trim().is_empty() {
        return ParseOutcome::Unavailable;
    }
    if lvs_mismatch_re().is_match(text) {
        ParseOutcome::Parsed(false)
    } else if lvs_match_re().is_match(text) {
        ParseOutcome::Parsed(true)
    } else {
        ParseOutcome::Malformed("no LVS verdict found".to_string())
    }
}

/// Number of nets with antenna violations.
pub fn parse_antenna_violations(text: &str) -> ParseOutcome<u32> {
    if text.trim().is_empty() {
        return ParseOutcome::Unavailable;
    }
    let Some(caps) = antenna_re().captures_iter(text).last() else {
        return ParseOutcome::Malformed("no antenna violation count found".to_string());
    };
    let raw = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
    match raw.map(str::parse::<u32>) {
        Some(Ok(n)) => ParseOutcome::Parsed(n),
        _ => ParseOutcome::Malformed("bad antenna violation count".to_string()),
    }
}

/// Worst IR drop, normalised to millivolts.
pub fn parse_worst_ir_drop_mv(text: &str) -> ParseOutcome<f64> {
    if text.trim().is_empty() {
        return ParseOutcome::Unavailable;
    }
    let Some(caps) = ir_drop_re().captures_iter(text).last() else {
        return ParseOutcome::Malformed("no worst-case IR drop found".to_string());
    };
    let Ok(value) = caps[1].parse::<f64>() else {
        return ParseOutcome::Malformed(format!("bad IR drop value '{}'", &caps[1]));
    };
    if caps[2].eq_ignore_ascii_case("v") {
        ParseOutcome::Parsed(value * 1000.0)
    } else {
        ParseOutcome::Parsed(value)
    }
}
