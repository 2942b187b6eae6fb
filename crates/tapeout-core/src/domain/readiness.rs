//! Tapeout checklist items, readiness scores and foundry deliverables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Checklist grouping. Every category except `Documentation` carries a fixed
/// weight in the overall score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistCategory {
    DesignFiles,
    DrcLvs,
    Timing,
    Power,
    Physical,
    Documentation,
}

impl ChecklistCategory {
    pub const ALL: [ChecklistCategory; 6] = [
        ChecklistCategory::DesignFiles,
        ChecklistCategory::DrcLvs,
        ChecklistCategory::Timing,
        ChecklistCategory::Power,
        ChecklistCategory::Physical,
        ChecklistCategory::Documentation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ChecklistCategory::DesignFiles => "design_files",
            ChecklistCategory::DrcLvs => "drc_lvs",
            ChecklistCategory::Timing => "timing",
            ChecklistCategory::Power => "power",
            ChecklistCategory::Physical => "physical",
            ChecklistCategory::Documentation => "documentation",
        }
    }

    /// Fixed contribution to the overall score. `Documentation` is displayed
    /// but contributes nothing.
    pub fn overall_weight(&self) -> f64 {
        match self {
            ChecklistCategory::DesignFiles => 0.15,
            ChecklistCategory::DrcLvs => 0.30,
            ChecklistCategory::Timing => 0.25,
            ChecklistCategory::Power => 0.15,
            ChecklistCategory::Physical => 0.15,
            ChecklistCategory::Documentation => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistStatus {
    Pass,
    Fail,
    Warning,
    NotRun,
    Skipped,
}

/// A resolved checklist entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecklistItem {
    pub id: String,
    pub name: String,
    pub category: ChecklistCategory,
    pub required: bool,
    /// Weight in `[0, 10]`, fixed per item id.
    pub weight: f64,
    pub status: ChecklistStatus,
    pub details: String,
}

/// Letter grade derived from the overall score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryScore {
    pub category: ChecklistCategory,
    pub score: f64,
    pub max_score: f64,
    /// `score / max_score * 100`, or 0 for an empty category.
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadinessScore {
    /// One entry per category, in `ChecklistCategory::ALL` order.
    pub categories: Vec<CategoryScore>,
    pub overall: f64,
    pub grade: Grade,
    pub tapeout_ready: bool,
    /// Names of required items that failed, sorted.
    pub missing_critical: Vec<String>,
}

impl ReadinessScore {
    pub fn category_percent(&self, category: ChecklistCategory) -> f64 {
        self.categories
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.percent)
            .unwrap_or(0.0)
    }
}

/// Presence of one foundry deliverable in a run directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliverableStatus {
    pub name: String,
    pub required: bool,
    pub present: bool,
    pub path: Option<String>,
}

/// Structural checks over the final GDSII stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GdsCheck {
    pub present: bool,
    pub path: Option<String>,
    pub size_bytes: u64,
    /// First record is a GDSII HEADER.
    pub valid_header: bool,
    /// Last record is ENDLIB.
    pub has_endlib: bool,
}

impl GdsCheck {
    pub fn structurally_valid(&self) -> bool {
        self.present && self.size_bytes > 0 && self.valid_header && self.has_endlib
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoundryReadiness {
    pub deliverables: Vec<DeliverableStatus>,
    pub gds: GdsCheck,
    /// GDS present and every required deliverable present.
    pub gds_ready: bool,
    pub warnings: Vec<String>,
}

impl FoundryReadiness {
    pub fn missing_required(&self) -> Vec<&str> {
        self.deliverables
            .iter()
            .filter(|d| d.required && !d.present)
            .map(|d| d.name.as_str())
            .collect()
    }
}

/// Full checklist evaluation for one run directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TapeoutChecklist {
    pub design: String,
    pub items: Vec<ChecklistItem>,
    pub score: ReadinessScore,
    pub foundry: FoundryReadiness,
    pub generated_at: DateTime<Utc>,
}
