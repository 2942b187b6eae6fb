//! Readiness scorer: checklist resolution, weighted scoring and foundry
//! deliverable checks.
//!
//! Items come from a fixed template catalog. Each one resolves to a status
//! from run-directory evidence or a prior [`SignoffReport`]; missing evidence
//! resolves to `not_run`, never `pass`. Scoring is a pure function of the
//! resolved items and does not depend on their order.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use crate::config::{ChecklistConfig, SignoffConfig};
use crate::domain::error::Result;
use crate::domain::readiness::{
    CategoryScore, ChecklistCategory, ChecklistItem, ChecklistStatus, DeliverableStatus,
    FoundryReadiness, GdsCheck, Grade, ReadinessScore, TapeoutChecklist,
};
use crate::domain::signoff::{CheckKind, CheckStatus, SignoffReport};
use crate::domain::timing::PathType;
use crate::obs;
use crate::report_parser::{
    parse_antenna_violations, parse_drc_count, parse_lvs_match, parse_path_report,
    parse_worst_ir_drop_mv,
};
use crate::toolchain::CheckLimits;

/// Overall score at or above which a design with no missing critical items
/// is ready for tapeout.
pub const READY_THRESHOLD: f64 = 90.0;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Result of reading one report file: `None` when the file could not be
/// interpreted.
pub type ReportReader = fn(&str, &CheckLimits) -> Option<(ChecklistStatus, String)>;

/// How a checklist item finds its evidence.
#[derive(Clone, Copy)]
pub enum Evidence {
    /// A deliverable file. Absence is a failure.
    Artifact {
        extensions: &'static [&'static str],
        fragments: &'static [&'static str],
    },
    /// A tool report, preferably from the signoff run. Absence is `not_run`.
    Report {
        check: Option<CheckKind>,
        fragments: &'static [&'static str],
        read: ReportReader,
    },
}

/// Immutable catalog entry; `weight` never changes per id.
#[derive(Clone, Copy)]
pub struct ChecklistTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub category: ChecklistCategory,
    pub required: bool,
    pub weight: f64,
    pub evidence: Evidence,
}

const REPORT_EXTENSIONS: &[&str] = &[".rpt", ".log", ".txt", ".out", ".drc"];

const fn artifact(
    id: &'static str,
    name: &'static str,
    category: ChecklistCategory,
    required: bool,
    weight: f64,
    extensions: &'static [&'static str],
    fragments: &'static [&'static str],
) -> ChecklistTemplate {
    ChecklistTemplate {
        id,
        name,
        category,
        required,
        weight,
        evidence: Evidence::Artifact {
            extensions,
            fragments,
        },
    }
}

const fn report(
    id: &'static str,
    name: &'static str,
    category: ChecklistCategory,
    required: bool,
    weight: f64,
    check: Option<CheckKind>,
    fragments: &'static [&'static str],
    read: ReportReader,
) -> ChecklistTemplate {
    ChecklistTemplate {
        id,
        name,
        category,
        required,
        weight,
        evidence: Evidence::Report {
            check,
            fragments,
            read,
        },
    }
}

/// File extensions accepted as a GDSII stream.
pub const GDS_EXTENSIONS: &[&str] = &[".gds", ".gds2", ".gdsii"];
/// File extensions accepted as a gate-level Verilog netlist.
pub const NETLIST_EXTENSIONS: &[&str] = &[".v", ".vg"];

#[rustfmt::skip]
pub const CHECKLIST_TEMPLATES: &[ChecklistTemplate] = &[
    // design_files
    artifact("gds_present", "GDSII layout", ChecklistCategory::DesignFiles, true, 10.0, GDS_EXTENSIONS, &[]),
    artifact("def_present", "DEF layout", ChecklistCategory::DesignFiles, true, 8.0, &[".def"], &[]),
    artifact("netlist_present", "Gate-level netlist", ChecklistCategory::DesignFiles, true, 9.0, NETLIST_EXTENSIONS, &[]),
    artifact("lef_present", "LEF abstract", ChecklistCategory::DesignFiles, false, 5.0, &[".lef"], &[]),
    artifact("sdc_present", "Timing constraints", ChecklistCategory::DesignFiles, true, 7.0, &[".sdc"], &[]),
    // drc_lvs
    report("drc_clean", "DRC clean", ChecklistCategory::DrcLvs, true, 10.0, Some(CheckKind::Drc), &["drc"], read_drc),
    report("lvs_match", "LVS match", ChecklistCategory::DrcLvs, true, 10.0, Some(CheckKind::Lvs), &["lvs"], read_lvs),
    report("antenna_clean", "Antenna clean", ChecklistCategory::DrcLvs, true, 7.0, Some(CheckKind::Antenna), &["antenna"], read_antenna),
    // timing
    report("setup_met", "Setup timing met", ChecklistCategory::Timing, true, 10.0, Some(CheckKind::Timing), &["setup", "max"], read_setup),
    // The signoff timing check measures setup paths only.
    report("hold_met", "Hold timing met", ChecklistCategory::Timing, true, 10.0, None, &["hold", "min"], read_hold),
    artifact("spef_present", "Extracted parasitics", ChecklistCategory::Timing, false, 5.0, &[".spef"], &[]),
    // power
    report("ir_drop_ok", "IR drop within limit", ChecklistCategory::Power, true, 8.0, Some(CheckKind::IrDrop), &["ir_drop", "irdrop", "psm"], read_ir_drop),
    report("power_report", "Power report", ChecklistCategory::Power, false, 5.0, None, &["power"], read_present),
    // physical
    report("utilization_report", "Utilization report", ChecklistCategory::Physical, false, 4.0, None, &["util"], read_present),
    report("density_report", "Metal density report", ChecklistCategory::Physical, false, 5.0, None, &["density"], read_present),
    // documentation
    artifact("readme", "Design README", ChecklistCategory::Documentation, false, 3.0, &[], &["readme"]),
    artifact("pinout", "Pinout description", ChecklistCategory::Documentation, false, 3.0, &[], &["pinout"]),
];

pub fn template(id: &str) -> Option<&'static ChecklistTemplate> {
    CHECKLIST_TEMPLATES.iter().find(|t| t.id == id)
}

// ---------------------------------------------------------------------------
// Report readers
// ---------------------------------------------------------------------------

fn read_drc(text: &str, limits: &CheckLimits) -> Option<(ChecklistStatus, String)> {
    let count = parse_drc_count(text).parsed()?;
    let status = if count == 0 {
        ChecklistStatus::Pass
    } else if count <= limits.drc_max_violations {
        ChecklistStatus::Warning
    } else {
        ChecklistStatus::Fail
    };
    Some((status, format!("{} DRC violation(s)", count)))
}

fn read_lvs(text: &str, _: &CheckLimits) -> Option<(ChecklistStatus, String)> {
    let matched = parse_lvs_match(text).parsed()?;
    Some(if matched {
        (ChecklistStatus::Pass, "circuits match".to_string())
    } else {
        (ChecklistStatus::Fail, "circuits do not match".to_string())
    })
}

fn read_antenna(text: &str, _: &CheckLimits) -> Option<(ChecklistStatus, String)> {
    let count = parse_antenna_violations(text).parsed()?;
    let status = if count == 0 {
        ChecklistStatus::Pass
    } else {
        ChecklistStatus::Fail
    };
    Some((status, format!("{} antenna violation(s)", count)))
}

fn read_paths(text: &str, path_type: PathType) -> Option<(ChecklistStatus, String)> {
    let violations = parse_path_report(text, path_type).parsed()?;
    Some(if violations.is_empty() {
        (ChecklistStatus::Pass, format!("no {} violations", path_type.name()))
    } else {
        (
            ChecklistStatus::Fail,
            format!("{} {} violation(s)", violations.len(), path_type.name()),
        )
    })
}

fn read_setup(text: &str, _: &CheckLimits) -> Option<(ChecklistStatus, String)> {
    read_paths(text, PathType::Setup)
}

fn read_hold(text: &str, _: &CheckLimits) -> Option<(ChecklistStatus, String)> {
    read_paths(text, PathType::Hold)
}

fn read_ir_drop(text: &str, limits: &CheckLimits) -> Option<(ChecklistStatus, String)> {
    let worst = parse_worst_ir_drop_mv(text).parsed()?;
    let status = if worst <= limits.ir_drop_max_mv {
        ChecklistStatus::Pass
    } else {
        ChecklistStatus::Fail
    };
    Some((status, format!("worst IR drop {:.2} mV", worst)))
}

fn read_present(text: &str, _: &CheckLimits) -> Option<(ChecklistStatus, String)> {
    if text.trim().is_empty() {
        None
    } else {
        Some((ChecklistStatus::Pass, "report present".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Evidence probing
// ---------------------------------------------------------------------------

/// Every regular file under `root`, sorted. Unreadable directories are
/// skipped; symlinked directories are not followed.
pub fn collect_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    files
}

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn matches_file(path: &Path, extensions: &[&str], fragments: &[&str]) -> bool {
    let name = file_name_lower(path);
    (extensions.is_empty() || extensions.iter().any(|e| name.ends_with(e)))
        && (fragments.is_empty() || fragments.iter().any(|f| name.contains(f)))
}

fn signoff_status(status: CheckStatus) -> ChecklistStatus {
    match status {
        CheckStatus::Pass => ChecklistStatus::Pass,
        CheckStatus::Warning => ChecklistStatus::Warning,
        CheckStatus::Skipped => ChecklistStatus::Skipped,
        CheckStatus::Fail | CheckStatus::Error => ChecklistStatus::Fail,
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Ordered `(predicate over (overall, no missing critical), grade)` table.
const GRADE_RULES: &[(fn(f64, bool) -> bool, Grade)] = &[
    (|overall, clean| clean && overall >= 90.0, Grade::A),
    (|overall, _| overall >= 80.0, Grade::B),
    (|overall, _| overall >= 70.0, Grade::C),
    (|overall, _| overall >= 60.0, Grade::D),
];

pub fn grade_for(overall: f64, missing_critical: usize) -> Grade {
    GRADE_RULES
        .iter()
        .find(|(predicate, _)| predicate(overall, missing_critical == 0))
        .map(|(_, grade)| *grade)
        .unwrap_or(Grade::F)
}

fn credit(item: &ChecklistItem) -> f64 {
    match item.status {
        ChecklistStatus::Pass => item.weight,
        ChecklistStatus::Warning => item.weight * 0.5,
        ChecklistStatus::Fail | ChecklistStatus::NotRun | ChecklistStatus::Skipped => 0.0,
    }
}

/// Weighted score over resolved items.
///
/// Category sums are taken in item-id order so the result does not depend on
/// the order of `items`.
pub fn calculate_readiness_score(items: &[ChecklistItem]) -> ReadinessScore {
    let mut sorted: Vec<&ChecklistItem> = items.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let categories: Vec<CategoryScore> = ChecklistCategory::ALL
        .iter()
        .map(|&category| {
            let in_category = sorted.iter().filter(|i| i.category == category);
            let (score, max_score) = in_category.fold((0.0, 0.0), |(score, max), item| {
                (score + credit(item), max + item.weight)
            });
            let percent = if max_score > 0.0 {
                (score / max_score * 100.0).clamp(0.0, 100.0)
            } else {
                0.0
            };
            CategoryScore {
                category,
                score,
                max_score,
                percent,
            }
        })
        .collect();

    let overall = categories
        .iter()
        .map(|c| c.percent * c.category.overall_weight())
        .sum::<f64>()
        .clamp(0.0, 100.0);

    let mut missing_critical: Vec<String> = items
        .iter()
        .filter(|i| i.required && i.status == ChecklistStatus::Fail)
        .map(|i| i.name.clone())
        .collect();
    missing_critical.sort();

    let grade = grade_for(overall, missing_critical.len());
    let tapeout_ready = missing_critical.is_empty() && overall >= READY_THRESHOLD;

    ReadinessScore {
        categories,
        overall,
        grade,
        tapeout_ready,
        missing_critical,
    }
}

// ---------------------------------------------------------------------------
// Foundry deliverables
// ---------------------------------------------------------------------------

struct Deliverable {
    name: &'static str,
    required: bool,
    extensions: &'static [&'static str],
}

const DELIVERABLES: &[Deliverable] = &[
    Deliverable {
        name: "GDSII layout",
        required: true,
        extensions: GDS_EXTENSIONS,
    },
    Deliverable {
        name: "LEF abstract",
        required: true,
        extensions: &[".lef"],
    },
    Deliverable {
        name: "Gate-level netlist",
        required: true,
        extensions: NETLIST_EXTENSIONS,
    },
    Deliverable {
        name: "Timing constraints",
        required: false,
        extensions: &[".sdc"],
    },
    Deliverable {
        name: "Liberty timing model",
        required: false,
        extensions: &[".lib"],
    },
    Deliverable {
        name: "Extracted parasitics",
        required: false,
        extensions: &[".spef"],
    },
];

const GDS_HEADER: u8 = 0x00;
const GDS_ENDLIB: u8 = 0x04;

/// Walk GDSII records from offset 0. Returns `(valid_header, has_endlib)`.
///
/// Zero padding after ENDLIB is allowed; any other trailing data is not.
fn inspect_gds(path: &Path) -> std::io::Result<(bool, bool)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut header = [0u8; 4];
    let mut first = true;
    let mut valid_header = false;

    loop {
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok((valid_header, false))
            }
            Err(e) => return Err(e),
        }
        let length = u16::from_be_bytes([header[0], header[1]]) as i64;
        let record_type = header[2];
        if first {
            valid_header = length >= 4 && record_type == GDS_HEADER;
            if !valid_header {
                return Ok((false, false));
            }
            first = false;
        }
        if length < 4 || length % 2 != 0 {
            return Ok((valid_header, false));
        }
        if record_type == GDS_ENDLIB {
            reader.seek_relative(length - 4)?;
            let mut rest = Vec::new();
            reader.read_to_end(&mut rest)?;
            return Ok((valid_header, rest.iter().all(|b| *b == 0)));
        }
        reader.seek_relative(length - 4)?;
    }
}

pub fn check_gds(files: &[PathBuf]) -> GdsCheck {
    let Some(path) = files
        .iter()
        .find(|p| matches_file(p, GDS_EXTENSIONS, &[]))
    else {
        return GdsCheck::default();
    };
    let size_bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let (valid_header, has_endlib) = if size_bytes == 0 {
        (false, false)
    } else {
        inspect_gds(path).unwrap_or_else(|e| {
            debug!(path = %path.display(), error = %e, "GDS unreadable");
            (false, false)
        })
    };
    GdsCheck {
        present: true,
        path: Some(path.display().to_string()),
        size_bytes,
        valid_header,
        has_endlib,
    }
}

/// Check `run_dir` for the fixed foundry deliverable list.
pub fn check_foundry_readiness(run_dir: &Path) -> FoundryReadiness {
    foundry_from_files(&collect_files(run_dir))
}

fn foundry_from_files(files: &[PathBuf]) -> FoundryReadiness {
    let deliverables: Vec<DeliverableStatus> = DELIVERABLES
        .iter()
        .map(|d| {
            let found = files.iter().find(|p| matches_file(p, d.extensions, &[]));
            DeliverableStatus {
                name: d.name.to_string(),
                required: d.required,
                present: found.is_some(),
                path: found.map(|p| p.display().to_string()),
            }
        })
        .collect();

    let gds = check_gds(files);
    let mut warnings = Vec::new();
    if gds.present {
        if gds.size_bytes == 0 {
            warnings.push("GDS file is empty".to_string());
        } else if !gds.valid_header {
            warnings.push("GDS does not start with a HEADER record".to_string());
        } else if !gds.has_endlib {
            warnings.push("GDS does not end with an ENDLIB record".to_string());
        }
    }
    for d in deliverables.iter().filter(|d| !d.required && !d.present) {
        warnings.push(format!("optional deliverable missing: {}", d.name));
    }

    let gds_ready = gds.present && deliverables.iter().all(|d| !d.required || d.present);
    FoundryReadiness {
        deliverables,
        gds,
        gds_ready,
        warnings,
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Resolves the catalog against evidence and scores it.
pub struct ReadinessScorer {
    checklist: ChecklistConfig,
    limits: CheckLimits,
}

impl ReadinessScorer {
    /// Validates the checklist overrides; report limits come from `signoff`.
    pub fn new(checklist: ChecklistConfig, signoff: &SignoffConfig) -> Result<Self> {
        checklist.validate()?;
        Ok(Self {
            checklist,
            limits: signoff.limits(),
        })
    }

    fn resolve(
        &self,
        template: &ChecklistTemplate,
        files: &[PathBuf],
        signoff: Option<&SignoffReport>,
    ) -> ChecklistItem {
        let (status, details) = match template.evidence {
            Evidence::Artifact {
                extensions,
                fragments,
            } => match files.iter().find(|p| matches_file(p, extensions, fragments)) {
                Some(path) => (ChecklistStatus::Pass, format!("found {}", path.display())),
                None => (ChecklistStatus::Fail, "not found in run directory".to_string()),
            },
            Evidence::Report {
                check,
                fragments,
                read,
            } => self.resolve_report(check, fragments, read, files, signoff),
        };

        let required = self
            .checklist
            .required_overrides
            .get(template.id)
            .copied()
            .unwrap_or(template.required);

        ChecklistItem {
            id: template.id.to_string(),
            name: template.name.to_string(),
            category: template.category,
            required,
            weight: template.weight,
            status,
            details,
        }
    }

    fn resolve_report(
        &self,
        check: Option<CheckKind>,
        fragments: &[&str],
        read: ReportReader,
        files: &[PathBuf],
        signoff: Option<&SignoffReport>,
    ) -> (ChecklistStatus, String) {
        if let Some(result) = check.and_then(|c| signoff.and_then(|r| r.check(c))) {
            let summary = result.details.first().cloned().unwrap_or_default();
            return (
                signoff_status(result.status),
                format!("signoff {}: {}", result.name(), summary),
            );
        }

        let mut unreadable = None;
        for path in files
            .iter()
            .filter(|p| matches_file(p, REPORT_EXTENSIONS, fragments))
        {
            let Ok(text) = std::fs::read_to_string(path) else {
                continue;
            };
            match read(&text, &self.limits) {
                Some((status, summary)) => {
                    return (status, format!("{} ({})", summary, path.display()))
                }
                None => unreadable = Some(path),
            }
        }
        match unreadable {
            Some(path) => (
                ChecklistStatus::NotRun,
                format!("report not understood: {}", path.display()),
            ),
            None => (ChecklistStatus::NotRun, "no report found".to_string()),
        }
    }

    fn items_from_files(
        &self,
        files: &[PathBuf],
        signoff: Option<&SignoffReport>,
    ) -> Vec<ChecklistItem> {
        CHECKLIST_TEMPLATES
            .iter()
            .map(|t| self.resolve(t, files, signoff))
            .collect()
    }

    /// Resolve every catalog item in catalog order.
    pub fn resolve_items(
        &self,
        run_dir: &Path,
        signoff: Option<&SignoffReport>,
    ) -> Vec<ChecklistItem> {
        self.items_from_files(&collect_files(run_dir), signoff)
    }

    /// Full checklist: items, score and foundry deliverables.
    pub fn evaluate(
        &self,
        design: &str,
        run_dir: &Path,
        signoff: Option<&SignoffReport>,
    ) -> TapeoutChecklist {
        let files = collect_files(run_dir);
        let items = self.items_from_files(&files, signoff);
        let score = calculate_readiness_score(&items);
        let foundry = foundry_from_files(&files);
        obs::emit_readiness_scored(design, score.overall, score.grade, score.tapeout_ready);

        TapeoutChecklist {
            design: design.to_string(),
            items,
            score,
            foundry,
            generated_at: Utc::now(),
        }
    }
}
