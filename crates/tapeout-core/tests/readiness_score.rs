use std::path::Path;
use std::sync::Arc;

use tapeout_core::fakes::FakeToolchain;
use tapeout_core::{
    calculate_readiness_score, check_foundry_readiness, grade_for, ChecklistCategory,
    ChecklistConfig, ChecklistItem, ChecklistStatus, CheckKind, CheckOutcome, DesignSnapshot,
    Grade, ReadinessScorer, SignoffConfig, SignoffOrchestrator, SignoffReport, TapeoutError,
    ToolchainError, CHECKLIST_TEMPLATES,
};
use tempfile::tempdir;

/// HEADER (version 600) followed by ENDLIB and zero padding.
const MINIMAL_GDS: &[u8] = &[
    0x00, 0x06, 0x00, 0x02, 0x02, 0x58, // HEADER
    0x00, 0x04, 0x04, 0x00, // ENDLIB
    0x00, 0x00, 0x00, 0x00,
];

fn write(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create dirs");
    }
    std::fs::write(path, contents).expect("write file");
}

/// Every deliverable plus the non-signoff reports.
fn populate_run_dir(root: &Path) {
    write(root, "final/gds/top.gds", MINIMAL_GDS);
    write(root, "final/def/top.def", b"VERSION 5.8 ;\n");
    write(root, "final/verilog/top.v", b"module top(); endmodule\n");
    write(root, "final/lef/top.lef", b"VERSION 5.8 ;\n");
    write(root, "final/sdc/top.sdc", b"create_clock -period 10 clk\n");
    write(root, "final/spef/top.spef", b"*SPEF \"IEEE 1481-1998\"\n");
    write(root, "reports/power.rpt", b"Total power 1.2e-3 W\n");
    write(root, "reports/util.rpt", b"Design area 1200 u^2 48% utilization.\n");
    write(root, "reports/density.rpt", b"met1 density 42%\n");
    write(root, "reports/hold.rpt", b"No paths found.\n");
}

fn scorer(checklist: ChecklistConfig) -> ReadinessScorer {
    ReadinessScorer::new(checklist, &SignoffConfig::default()).expect("valid checklist")
}

async fn clean_signoff() -> SignoffReport {
    let fake = Arc::new(
        FakeToolchain::new()
            .with_check(CheckKind::Drc, CheckOutcome::with_count(0))
            .with_check(CheckKind::Lvs, CheckOutcome::with_count(0).with_match(true))
            .with_check(CheckKind::Antenna, CheckOutcome::with_count(0))
            .with_check(CheckKind::IrDrop, CheckOutcome::with_count(0).with_metric(12.0))
            .with_check(CheckKind::Timing, CheckOutcome::with_count(0).with_metric(0.05)),
    );
    SignoffOrchestrator::new(fake, SignoffConfig::default())
        .expect("valid config")
        .run(&DesignSnapshot::new("top", "runs/r1"))
        .await
}

#[test]
fn empty_run_dir_misses_every_required_design_file() {
    let dir = tempdir().expect("tempdir");
    let checklist = scorer(ChecklistConfig::default()).evaluate("top", dir.path(), None);
    let score = &checklist.score;

    for t in CHECKLIST_TEMPLATES
        .iter()
        .filter(|t| t.required && t.category == ChecklistCategory::DesignFiles)
    {
        assert!(
            score.missing_critical.iter().any(|m| m == t.name),
            "{} missing from {:?}",
            t.name,
            score.missing_critical
        );
    }
    assert_eq!(score.category_percent(ChecklistCategory::DesignFiles), 0.0);
    assert!(!score.tapeout_ready);
    assert_eq!(score.grade, Grade::F);
    assert!(!checklist.foundry.gds_ready);
}

#[test]
fn unavailable_reports_resolve_to_not_run() {
    let dir = tempdir().expect("tempdir");
    let items = scorer(ChecklistConfig::default()).resolve_items(dir.path(), None);

    let drc = items.iter().find(|i| i.id == "drc_clean").expect("drc item");
    assert_eq!(drc.status, ChecklistStatus::NotRun);
    assert!(items
        .iter()
        .all(|i| i.status != ChecklistStatus::Pass));
}

#[tokio::test]
async fn complete_run_with_clean_signoff_is_ready() {
    let dir = tempdir().expect("tempdir");
    populate_run_dir(dir.path());
    let signoff = clean_signoff().await;

    let checklist =
        scorer(ChecklistConfig::default()).evaluate("top", dir.path(), Some(&signoff));
    let score = &checklist.score;

    assert!(score.missing_critical.is_empty(), "{:?}", score.missing_critical);
    assert!(score.overall >= 99.999, "overall {}", score.overall);
    assert_eq!(score.grade, Grade::A);
    assert!(score.tapeout_ready);
    assert!(checklist.foundry.gds_ready);
    assert!(checklist.foundry.gds.structurally_valid());
}

#[test]
fn score_is_independent_of_item_order() {
    let dir = tempdir().expect("tempdir");
    populate_run_dir(dir.path());
    write(dir.path(), "reports/drc.rpt", b"Total DRC errors found: 0\n");
    write(dir.path(), "reports/lvs.log", b"Netlists do not match.\n");

    let items = scorer(ChecklistConfig::default()).resolve_items(dir.path(), None);
    let baseline = calculate_readiness_score(&items);

    let mut reversed = items.clone();
    reversed.reverse();
    assert_eq!(calculate_readiness_score(&reversed), baseline);

    for shift in 1..items.len() {
        let mut rotated = items.clone();
        rotated.rotate_left(shift);
        assert_eq!(calculate_readiness_score(&rotated), baseline);
    }

    assert!((0.0..=100.0).contains(&baseline.overall));
    assert_eq!(
        baseline.grade,
        grade_for(baseline.overall, baseline.missing_critical.len())
    );
}

#[test]
fn rescoring_unchanged_evidence_is_idempotent() {
    let dir = tempdir().expect("tempdir");
    populate_run_dir(dir.path());
    write(dir.path(), "reports/antenna.rpt", b"Found 3 net violations.\n");

    let scorer = scorer(ChecklistConfig::default());
    let first = scorer.evaluate("top", dir.path(), None);
    let second = scorer.evaluate("top", dir.path(), None);

    assert_eq!(first.score, second.score);
    assert_eq!(first.items, second.items);
}

#[test]
fn report_files_are_parsed_without_signoff() {
    let dir = tempdir().expect("tempdir");
    write(dir.path(), "reports/drc.rpt", b"Total DRC errors found: 0\n");
    write(dir.path(), "reports/lvs.log", b"Netlists do not match.\n");
    write(dir.path(), "reports/antenna.rpt", b"nothing useful here\n");

    let items = scorer(ChecklistConfig::default()).resolve_items(dir.path(), None);
    let status = |id: &str| {
        items
            .iter()
            .find(|i| i.id == id)
            .map(|i| i.status)
            .expect("item present")
    };

    assert_eq!(status("drc_clean"), ChecklistStatus::Pass);
    assert_eq!(status("lvs_match"), ChecklistStatus::Fail);
    assert_eq!(status("antenna_clean"), ChecklistStatus::NotRun);
}

#[tokio::test]
async fn signoff_result_takes_precedence_over_report_files() {
    let dir = tempdir().expect("tempdir");
    write(dir.path(), "reports/drc.rpt", b"Total DRC errors found: 0\n");

    let fake = Arc::new(FakeToolchain::new().with_check_error(
        CheckKind::Drc,
        ToolchainError::invocation("magic", "killed"),
    ));
    let signoff = SignoffOrchestrator::new(fake, SignoffConfig::only(&[CheckKind::Drc]))
        .expect("valid config")
        .run(&DesignSnapshot::new("top", dir.path()))
        .await;

    let items = scorer(ChecklistConfig::default()).resolve_items(dir.path(), Some(&signoff));
    let drc = items.iter().find(|i| i.id == "drc_clean").expect("drc item");
    assert_eq!(drc.status, ChecklistStatus::Fail);
    assert!(drc.details.starts_with("signoff drc"));
}

#[tokio::test]
async fn hold_violations_are_not_hidden_by_setup_signoff() {
    let dir = tempdir().expect("tempdir");
    write(
        dir.path(),
        "reports/hold.rpt",
        b"Startpoint: core/r3 (rising edge-triggered flip-flop clocked by clk)
Endpoint: core/r4 (rising edge-triggered flip-flop clocked by clk)
Path Group: clk
Path Type: min

  -0.20   slack (VIOLATED)
",
    );

    let fake = Arc::new(
        FakeToolchain::new()
            .with_check(CheckKind::Timing, CheckOutcome::with_count(0).with_metric(0.05)),
    );
    let signoff = SignoffOrchestrator::new(fake, SignoffConfig::only(&[CheckKind::Timing]))
        .expect("valid config")
        .run(&DesignSnapshot::new("top", dir.path()))
        .await;

    let items = scorer(ChecklistConfig::default()).resolve_items(dir.path(), Some(&signoff));
    let find = |id: &str| items.iter().find(|i| i.id == id).expect("item present");

    let setup = find("setup_met");
    assert_eq!(setup.status, ChecklistStatus::Pass);
    assert!(setup.details.starts_with("signoff timing"));

    let hold = find("hold_met");
    assert_eq!(hold.status, ChecklistStatus::Fail);
    assert!(hold.details.contains("1 hold violation(s)"), "{}", hold.details);
}

#[tokio::test]
async fn hold_without_report_is_not_run_despite_timing_signoff() {
    let dir = tempdir().expect("tempdir");
    let signoff = clean_signoff().await;

    let items = scorer(ChecklistConfig::default()).resolve_items(dir.path(), Some(&signoff));
    let hold = items.iter().find(|i| i.id == "hold_met").expect("hold item");
    assert_eq!(hold.status, ChecklistStatus::NotRun);
}

#[test]
fn required_overrides_change_requirement_not_weight() {
    let dir = tempdir().expect("tempdir");
    let mut checklist = ChecklistConfig::default();
    checklist
        .required_overrides
        .insert("lef_present".to_string(), true);
    checklist
        .required_overrides
        .insert("gds_present".to_string(), false);

    let result = scorer(checklist).evaluate("top", dir.path(), None);
    let missing = &result.score.missing_critical;
    assert!(missing.iter().any(|m| m == "LEF abstract"));
    assert!(!missing.iter().any(|m| m == "GDSII layout"));

    let lef = result
        .items
        .iter()
        .find(|i| i.id == "lef_present")
        .expect("lef item");
    assert_eq!(lef.weight, 5.0);
}

#[test]
fn unknown_override_id_is_a_config_error() {
    let mut checklist = ChecklistConfig::default();
    checklist
        .required_overrides
        .insert("bogus_item".to_string(), true);

    let err = ReadinessScorer::new(checklist, &SignoffConfig::default())
        .err()
        .expect("unknown id rejected");
    assert!(matches!(err, TapeoutError::Config(_)));
}

#[test]
fn documentation_is_displayed_but_not_scored() {
    let dir = tempdir().expect("tempdir");
    populate_run_dir(dir.path());
    let scorer = scorer(ChecklistConfig::default());
    let without = scorer.evaluate("top", dir.path(), None).score;

    write(dir.path(), "README.md", b"# top\n");
    write(dir.path(), "docs/pinout.md", b"| pin | dir |\n");
    let with = scorer.evaluate("top", dir.path(), None).score;

    assert_eq!(with.category_percent(ChecklistCategory::Documentation), 100.0);
    assert_eq!(without.category_percent(ChecklistCategory::Documentation), 0.0);
    assert_eq!(with.overall, without.overall);
}

#[test]
fn warnings_earn_half_credit() {
    let item = |status| ChecklistItem {
        id: "drc_clean".to_string(),
        name: "DRC clean".to_string(),
        category: ChecklistCategory::DrcLvs,
        required: true,
        weight: 10.0,
        status,
        details: String::new(),
    };
    let score = calculate_readiness_score(&[item(ChecklistStatus::Warning)]);
    assert_eq!(score.category_percent(ChecklistCategory::DrcLvs), 50.0);
    assert!(score.missing_critical.is_empty());

    let score = calculate_readiness_score(&[item(ChecklistStatus::Fail)]);
    assert_eq!(score.missing_critical, vec!["DRC clean".to_string()]);
}

#[test]
fn foundry_check_flags_truncated_gds() {
    let dir = tempdir().expect("tempdir");
    write(dir.path(), "top.gds", &MINIMAL_GDS[..6]);
    write(dir.path(), "top.lef", b"VERSION 5.8 ;\n");
    write(dir.path(), "top.v", b"module top(); endmodule\n");

    let foundry = check_foundry_readiness(dir.path());
    assert!(foundry.gds.present);
    assert!(foundry.gds.valid_header);
    assert!(!foundry.gds.has_endlib);
    assert!(foundry.gds_ready);
    assert!(foundry.warnings.iter().any(|w| w.contains("ENDLIB")));
    assert!(foundry
        .warnings
        .iter()
        .any(|w| w.contains("Liberty timing model")));
}

#[test]
fn foundry_requires_every_required_deliverable() {
    let dir = tempdir().expect("tempdir");
    write(dir.path(), "top.gds", MINIMAL_GDS);
    write(dir.path(), "top.v", b"module top(); endmodule\n");

    let foundry = check_foundry_readiness(dir.path());
    assert!(foundry.gds.structurally_valid());
    assert!(!foundry.gds_ready);
    assert_eq!(foundry.missing_required(), vec!["LEF abstract"]);
}
