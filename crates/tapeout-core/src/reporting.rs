//! Human-readable rendering and persisted artifacts.
//!
//! - Markdown summaries for signoff, ECO and checklist results
//! - ECO TCL scripts from a fix list
//! - `<dir>/<run_id>/<name>.json` artifacts with a SHA-256 `.digest` sidecar

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::eco::{EcoFix, EcoResult};
use crate::domain::error::{Result, TapeoutError};
use crate::domain::readiness::{ChecklistStatus, TapeoutChecklist};
use crate::domain::signoff::{CheckStatus, SignoffReport};

fn check_mark(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "✓ pass",
        CheckStatus::Fail => "✗ fail",
        CheckStatus::Warning => "! warning",
        CheckStatus::Skipped => "- skipped",
        CheckStatus::Error => "✗ error",
    }
}

fn item_mark(status: ChecklistStatus) -> &'static str {
    match status {
        ChecklistStatus::Pass => "✓ pass",
        ChecklistStatus::Fail => "✗ fail",
        ChecklistStatus::Warning => "! warning",
        ChecklistStatus::NotRun => "- not run",
        ChecklistStatus::Skipped => "- skipped",
    }
}

// ── markdown ──────────────────────────────────────────────────────────────

pub fn render_signoff_markdown(report: &SignoffReport) -> String {
    let mut md = format!("# Signoff: {}\n\n", report.design());
    let _ = writeln!(md, "- Run: `{}`", report.run_id());
    let _ = writeln!(md, "- Started: {}", report.started_at().to_rfc3339());
    let _ = writeln!(md, "- Overall: **{}**", check_mark(report.overall_status()));
    let _ = writeln!(
        md,
        "- Tapeout ready: {}",
        if report.tapeout_ready() { "yes" } else { "no" }
    );

    md.push_str("\n| Check | Status | Violations | Details |\n|---|---|---|---|\n");
    for c in report.checks() {
        let _ = writeln!(
            md,
            "| {} | {} | {} | {} |",
            c.check.display_name(),
            check_mark(c.status),
            c.violation_count,
            c.details.first().map(String::as_str).unwrap_or("")
        );
    }

    if !report.blockers().is_empty() {
        md.push_str("\n## Blockers\n\n");
        for b in report.blockers() {
            let _ = writeln!(md, "- {}", b);
        }
    }
    if !report.warnings().is_empty() {
        md.push_str("\n## Warnings\n\n");
        for w in report.warnings() {
            let _ = writeln!(md, "- {}", w);
        }
    }
    md
}

pub fn render_eco_markdown(result: &EcoResult) -> String {
    let mut md = format!("# ECO: {}\n\n", result.design);
    let _ = writeln!(md, "- Run: `{}`", result.run_id);
    let _ = writeln!(md, "- Stop reason: {:?}", result.stop_reason);
    let _ = writeln!(
        md,
        "- WNS: {:.3} → {:.3} ns (TNS {:.3} → {:.3} ns)",
        result.initial_wns_ns, result.final_wns_ns, result.initial_tns_ns, result.final_tns_ns
    );
    let _ = writeln!(md, "- Timing met: {}", result.timing_met);
    let _ = writeln!(md, "- Success: {}", result.success());
    let _ = writeln!(md, "- Fixes applied: {}", result.total_fixes_applied);

    md.push_str("\n## Iterations\n\n");
    md.push_str("| # | WNS before | WNS after | Fixes | Note |\n|---|---|---|---|---|\n");
    for it in &result.iterations {
        let note = match &it.failure {
            Some(f) => format!("failed ({:?}): {}", f.kind, f.message),
            None if it.converged => "converged".to_string(),
            None => String::new(),
        };
        let _ = writeln!(
            md,
            "| {} | {:.3} | {:.3} | {} | {} |",
            it.iteration, it.before_wns_ns, it.after_wns_ns, it.fixes_applied, note
        );
    }

    if !result.remaining_recommendations.is_empty() {
        md.push_str("\n## Remaining recommendations\n\n");
        for fix in &result.remaining_recommendations {
            let _ = writeln!(
                md,
                "- [{:?}] {} at `{}` (~{:.1} ps)",
                fix.priority,
                fix.action.name(),
                fix.location,
                fix.estimated_improvement_ps
            );
        }
    }
    if !result.analysis_conclusive {
        md.push_str(
            "\n> Closing timing analysis was inconclusive; recommendations may be incomplete.\n",
        );
    }
    md
}

pub fn render_checklist_markdown(checklist: &TapeoutChecklist) -> String {
    let score = &checklist.score;
    let mut md = format!("# Tapeout checklist: {}\n\n", checklist.design);
    let _ = writeln!(md, "- Overall: {:.1} (grade {:?})", score.overall, score.grade);
    let _ = writeln!(
        md,
        "- Tapeout ready: {}",
        if score.tapeout_ready { "yes" } else { "no" }
    );
    let _ = writeln!(
        md,
        "- Foundry GDS ready: {}",
        if checklist.foundry.gds_ready { "yes" } else { "no" }
    );

    md.push_str("\n| Category | Score | Percent |\n|---|---|---|\n");
    for c in &score.categories {
        let _ = writeln!(
            md,
            "| {} | {:.1}/{:.1} | {:.1}% |",
            c.category.name(),
            c.score,
            c.max_score,
            c.percent
        );
    }

    md.push_str("\n| Item | Required | Status | Details |\n|---|---|---|---|\n");
    for item in &checklist.items {
        let _ = writeln!(
            md,
            "| {} | {} | {} | {} |",
            item.name,
            if item.required { "yes" } else { "no" },
            item_mark(item.status),
            item.details
        );
    }

    if !score.missing_critical.is_empty() {
        md.push_str("\n## Missing critical\n\n");
        for name in &score.missing_critical {
            let _ = writeln!(md, "- {}", name);
        }
    }
    if !checklist.foundry.warnings.is_empty() {
        md.push_str("\n## Foundry warnings\n\n");
        for w in &checklist.foundry.warnings {
            let _ = writeln!(md, "- {}", w);
        }
    }
    md
}

// ── ECO script ────────────────────────────────────────────────────────────

/// Render a TCL script applying `fixes` in order. Repeated commands are
/// emitted once; each fix keeps a comment line.
pub fn render_eco_script(design: &str, fixes: &[EcoFix]) -> String {
    let mut script = format!(
        "# ECO script for {}\n# {} recommended fix(es)\n\n",
        design,
        fixes.len()
    );
    let mut emitted = HashSet::new();
    for fix in fixes {
        let _ = writeln!(
            script,
            "# {:?} {} at {} (~{:.1} ps)",
            fix.priority,
            fix.action.name(),
            fix.location,
            fix.estimated_improvement_ps
        );
        let command = fix.repair.to_tcl();
        if emitted.insert(command.clone()) {
            let _ = writeln!(script, "{}", command);
        }
    }
    script.push_str("\nreport_wns\nreport_tns\n");
    script
}

// ── artifacts ─────────────────────────────────────────────────────────────

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Persist `<dir>/<run_id>/<name>.json` and `<dir>/<run_id>/<name>.digest`.
pub fn write_artifact<T: Serialize>(
    value: &T,
    run_id: &str,
    name: &str,
    dir: &Path,
) -> Result<PathBuf> {
    let run_dir = dir.join(run_id);
    std::fs::create_dir_all(&run_dir)?;

    let artifact_path = run_dir.join(format!("{}.json", name));
    let digest_path = run_dir.join(format!("{}.digest", name));
    let json = serde_json::to_vec_pretty(value)?;

    std::fs::write(&artifact_path, &json)?;
    std::fs::write(&digest_path, sha256_hex(&json).as_bytes())?;
    Ok(artifact_path)
}

/// Read `<dir>/<run_id>/<name>.json`, verifying its digest first.
pub fn read_artifact<T: DeserializeOwned>(run_id: &str, name: &str, dir: &Path) -> Result<T> {
    let run_dir = dir.join(run_id);
    let json = std::fs::read(run_dir.join(format!("{}.json", name)))?;
    let expected = std::fs::read_to_string(run_dir.join(format!("{}.digest", name)))?;
    let actual = sha256_hex(&json);
    if expected.trim() != actual {
        return Err(TapeoutError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual,
        });
    }
    Ok(serde_json::from_slice(&json)?)
}

/// Write a rendered markdown summary next to the JSON artifacts.
pub fn write_markdown(markdown: &str, run_id: &str, name: &str, dir: &Path) -> Result<PathBuf> {
    let run_dir = dir.join(run_id);
    std::fs::create_dir_all(&run_dir)?;
    let path = run_dir.join(format!("{}.md", name));
    std::fs::write(&path, markdown)?;
    Ok(path)
}
