//! Timing-closure effort estimation from a single WNS/TNS measurement.

use serde::{Deserialize, Serialize};

use crate::fix_recommender::{first_match, Rule};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
    VeryHard,
}

impl Difficulty {
    pub fn name(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Moderate => "moderate",
            Difficulty::Hard => "hard",
            Difficulty::VeryHard => "very_hard",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClosureEffort {
    pub difficulty: Difficulty,
    pub estimated_iterations: u32,
    pub recommendations: Vec<String>,
}

/// `(difficulty, base iterations)` keyed on `|WNS|` in ns.
const DIFFICULTY_RULES: &[Rule<(Difficulty, f64)>] = &[
    (|w| w < 0.5, (Difficulty::Easy, 2.0)),
    (|w| w < 2.0, (Difficulty::Moderate, 3.0)),
    (|w| w < 5.0, (Difficulty::Hard, 6.0)),
    (|_| true, (Difficulty::VeryHard, 10.0)),
];

/// TNS contribution is `|TNS| / 50` iterations, capped.
const TNS_ITERATION_CAP: f64 = 10.0;

/// Cell count at which the size factor doubles the estimate.
const CELLS_PER_SCALE_STEP: f64 = 100_000.0;

fn advice(difficulty: Difficulty) -> &'static [&'static str] {
    match difficulty {
        Difficulty::Easy => &["Run repair_timing with default settings"],
        Difficulty::Moderate => &[
            "Enable gate sizing and VT swapping",
            "Review clock skew on the worst paths",
        ],
        Difficulty::Hard => &[
            "Enable buffer insertion and gate cloning",
            "Apply useful-skew clock tree optimization",
            "Review SDC constraints on the failing clock domains",
        ],
        Difficulty::VeryHard => &[
            "Restructure critical logic (pipelining or retiming)",
            "Revisit floorplan and placement density around critical paths",
            "Re-synthesize with tighter timing constraints",
        ],
    }
}

/// Estimate difficulty and repair iterations.
///
/// Non-violating designs (`wns_ns >= 0`) are easy with zero iterations. For
/// violating designs the iteration count grows with TNS and cell count.
pub fn estimate_closure_effort(wns_ns: f64, tns_ns: f64, cell_count: u64) -> ClosureEffort {
    if wns_ns >= 0.0 {
        return ClosureEffort {
            difficulty: Difficulty::Easy,
            estimated_iterations: 0,
            recommendations: vec!["Timing is met; no repair iterations needed".to_string()],
        };
    }

    let (difficulty, base) =
        first_match(DIFFICULTY_RULES, wns_ns.abs()).unwrap_or((Difficulty::VeryHard, 10.0));
    let tns_term = (tns_ns.abs() / 50.0).min(TNS_ITERATION_CAP);
    let size_factor = 1.0 + cell_count as f64 / CELLS_PER_SCALE_STEP;
    let estimated_iterations = ((base + tns_term) * size_factor).ceil() as u32;

    let mut recommendations: Vec<String> =
        advice(difficulty).iter().map(|s| s.to_string()).collect();
    if tns_ns.abs() > 100.0 {
        recommendations.push("Many failing endpoints: prioritize shared fan-in logic".to_string());
    }
    if cell_count as f64 > CELLS_PER_SCALE_STEP {
        recommendations.push("Large design: run ECO per partition".to_string());
    }

    ClosureEffort {
        difficulty,
        estimated_iterations,
        recommendations,
    }
}
