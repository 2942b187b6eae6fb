//! Tapeout - timing closure and signoff CLI
//!
//! The `tapeout` command drives the signoff engine over a place-and-route run.
//!
//! ## Commands
//!
//! - `eco`: Run the ECO timing-closure loop
//! - `signoff`: Run the signoff battery (DRC, LVS, antenna, IR drop, timing)
//! - `checklist`: Score tapeout readiness for a run directory
//! - `foundry`: Check foundry deliverables and GDS structure
//! - `recommend`: Recommend ECO fixes from timing reports, offline
//! - `effort`: Estimate closure effort from WNS/TNS

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use tapeout_core::readiness::collect_files;
use tapeout_core::{
    check_foundry_readiness, estimate_closure_effort, init_tracing, level_for, load_file,
    read_artifact, recommend_fixes, render_checklist_markdown, render_eco_markdown,
    render_eco_script, render_signoff_markdown, write_artifact, write_markdown, CheckKind,
    CheckStatus, ChecklistStatus, DesignSnapshot, EcoOptimizer, ReadinessScorer, SignoffOrchestrator,
    SignoffReport, TapeoutChecklist, TapeoutConfig, TimingAnalysis, ToolchainAdapter,
    GDS_EXTENSIONS, METRICS, NETLIST_EXTENSIONS,
};
use tapeout_toolchain::{ProcessToolchain, ToolchainSettings};

const DEFAULT_WORK_DIR: &str = ".tapeout/work";

#[derive(Parser)]
#[command(name = "tapeout")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Timing closure, signoff and tapeout readiness for ASIC runs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Engine and toolchain config (TOML or JSON)
    #[arg(short, long, global = true, env = "TAPEOUT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where the design comes from: a snapshot file, or a run directory to search.
#[derive(Args, Debug, Clone)]
struct DesignArgs {
    /// Top-level design name
    #[arg(short, long)]
    design: Option<String>,

    /// Place-and-route run directory
    #[arg(short, long)]
    run_dir: Option<PathBuf>,

    /// Design snapshot file (TOML or JSON); overrides discovery
    #[arg(long, conflicts_with = "run_dir")]
    snapshot: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ECO timing-closure loop
    Eco {
        #[command(flatten)]
        design: DesignArgs,

        /// Override the configured iteration limit
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Override the configured WNS target (ns)
        #[arg(long, allow_hyphen_values = true)]
        target_wns: Option<f64>,

        /// Directory for generated scripts, tool logs and the ECO database
        #[arg(long, default_value = DEFAULT_WORK_DIR)]
        work_dir: PathBuf,

        /// Write the result artifact and markdown summary here
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Run the signoff battery
    Signoff {
        #[command(flatten)]
        design: DesignArgs,

        /// Checks to run (comma-separated: drc,lvs,antenna,ir_drop,timing)
        #[arg(long)]
        checks: Option<String>,

        /// Run checks concurrently
        #[arg(long)]
        parallel: bool,

        #[arg(long, default_value = DEFAULT_WORK_DIR)]
        work_dir: PathBuf,

        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Score tapeout readiness for a run directory
    Checklist {
        /// Design name
        #[arg(short, long)]
        design: Option<String>,

        /// Place-and-route run directory
        #[arg(short, long, default_value = ".")]
        run_dir: PathBuf,

        /// Signoff artifact (`<dir>/<run_id>/signoff.json`) to take check results from
        #[arg(long)]
        signoff: Option<PathBuf>,

        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Check foundry deliverables and GDS structure
    Foundry {
        /// Place-and-route run directory
        #[arg(short, long, default_value = ".")]
        run_dir: PathBuf,
    },

    /// Recommend ECO fixes from timing reports (no tools needed)
    Recommend {
        /// OpenSTA max-delay report
        #[arg(long)]
        setup: Option<PathBuf>,

        /// OpenSTA min-delay report
        #[arg(long)]
        hold: Option<PathBuf>,

        /// Design name used in the generated script
        #[arg(short, long, default_value = "top")]
        design: String,

        /// Write a TCL ECO script here
        #[arg(long)]
        script: Option<PathBuf>,
    },

    /// Estimate timing-closure effort
    Effort {
        /// Worst negative slack (ns)
        #[arg(long, allow_hyphen_values = true)]
        wns: f64,

        /// Total negative slack (ns)
        #[arg(long, allow_hyphen_values = true)]
        tns: f64,

        /// Standard cell count
        #[arg(long, default_value = "0")]
        cells: u64,
    },
}

/// Config file layout: the engine sections plus a `[toolchain]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CliConfig {
    #[serde(flatten)]
    engine: TapeoutConfig,
    toolchain: ToolchainSettings,
}

fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let Some(path) = path else {
        return Ok(CliConfig::default());
    };
    let config: CliConfig = load_file(path)
        .with_context(|| format!("Failed to load config: {:?}", path))?;
    config
        .engine
        .validate()
        .with_context(|| format!("Invalid config: {:?}", path))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.json, level_for(cli.verbose));

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Eco {
            design,
            max_iterations,
            target_wns,
            work_dir,
            out,
        } => {
            cmd_eco(
                config,
                &design,
                max_iterations,
                target_wns,
                &work_dir,
                out.as_deref(),
            )
            .await
        }
        Commands::Signoff {
            design,
            checks,
            parallel,
            work_dir,
            out,
        } => {
            cmd_signoff(
                config,
                &design,
                checks.as_deref(),
                parallel,
                &work_dir,
                out.as_deref(),
            )
            .await
        }
        Commands::Checklist {
            design,
            run_dir,
            signoff,
            out,
        } => cmd_checklist(
            config,
            design.as_deref(),
            &run_dir,
            signoff.as_deref(),
            out.as_deref(),
        ),
        Commands::Foundry { run_dir } => cmd_foundry(&run_dir),
        Commands::Recommend {
            setup,
            hold,
            design,
            script,
        } => cmd_recommend(
            config,
            setup.as_deref(),
            hold.as_deref(),
            &design,
            script.as_deref(),
        ),
        Commands::Effort { wns, tns, cells } => cmd_effort(wns, tns, cells),
    }
}

// ---------------------------------------------------------------------------
// Design snapshots
// ---------------------------------------------------------------------------

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    extensions.iter().any(|e| name.ends_with(e))
}

/// First file with one of `extensions`, preferring names containing `design`.
fn pick(files: &[PathBuf], design: &str, extensions: &[&str]) -> Option<PathBuf> {
    let candidates: Vec<&PathBuf> = files
        .iter()
        .filter(|p| has_extension(p, extensions))
        .collect();
    candidates
        .iter()
        .find(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().contains(design))
                .unwrap_or(false)
        })
        .or_else(|| candidates.first())
        .map(|p| p.to_path_buf())
}

/// Build a snapshot by probing `run_dir` for design views.
fn discover_snapshot(design: &str, run_dir: &Path) -> Result<DesignSnapshot> {
    if !run_dir.is_dir() {
        anyhow::bail!("Run directory not found: {:?}", run_dir);
    }
    let files = collect_files(run_dir);
    let snapshot = DesignSnapshot {
        odb: pick(&files, design, &[".odb"]),
        def: pick(&files, design, &[".def"]),
        netlist: pick(&files, design, NETLIST_EXTENSIONS),
        sdc: pick(&files, design, &[".sdc"]),
        spef: pick(&files, design, &[".spef"]),
        gds: pick(&files, design, GDS_EXTENSIONS),
        liberty: files
            .iter()
            .filter(|p| has_extension(p, &[".lib"]))
            .cloned()
            .collect(),
        lef: files
            .iter()
            .filter(|p| has_extension(p, &[".lef"]))
            .cloned()
            .collect(),
        ..DesignSnapshot::new(design, run_dir)
    };
    if snapshot.odb.is_none() && snapshot.def.is_none() && snapshot.netlist.is_none() {
        anyhow::bail!(
            "No odb, def or netlist for design '{}' under {:?}",
            design,
            run_dir
        );
    }
    Ok(snapshot)
}

fn resolve_snapshot(args: &DesignArgs) -> Result<DesignSnapshot> {
    if let Some(path) = &args.snapshot {
        let mut snapshot: DesignSnapshot = load_file(path)
            .with_context(|| format!("Failed to load snapshot: {:?}", path))?;
        if let Some(design) = &args.design {
            snapshot.name = design.clone();
        }
        return Ok(snapshot);
    }
    let run_dir = args.run_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let design = match &args.design {
        Some(design) => design.clone(),
        None => default_design_name(&run_dir),
    };
    discover_snapshot(&design, &run_dir)
}

/// Directory name of the run, used when `--design` is omitted.
fn default_design_name(run_dir: &Path) -> String {
    std::fs::canonicalize(run_dir)
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "top".to_string())
}

fn process_toolchain(settings: ToolchainSettings, work_dir: &Path) -> Arc<dyn ToolchainAdapter> {
    Arc::new(ProcessToolchain::new(settings, work_dir))
}

fn parse_checks(list: &str) -> Result<Vec<CheckKind>> {
    list.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .map(|name| {
            CheckKind::ALL
                .into_iter()
                .find(|c| c.name() == name)
                .ok_or_else(|| anyhow::anyhow!("Unknown check: {}", name))
        })
        .collect()
}

/// Split `<dir>/<run_id>/<name>.json` into its artifact coordinates.
fn artifact_coordinates(path: &Path) -> Result<(String, String, PathBuf)> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .with_context(|| format!("Not an artifact path: {:?}", path))?;
    let run_dir = path
        .parent()
        .with_context(|| format!("Artifact has no run directory: {:?}", path))?;
    let run_id = run_dir
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .with_context(|| format!("Artifact has no run id: {:?}", path))?;
    let root = run_dir.parent().unwrap_or(Path::new(".")).to_path_buf();
    Ok((run_id, name, root))
}

fn status_symbol(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "✓",
        CheckStatus::Warning => "!",
        CheckStatus::Skipped => "-",
        CheckStatus::Fail | CheckStatus::Error => "✗",
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_eco(
    config: CliConfig,
    design: &DesignArgs,
    max_iterations: Option<u32>,
    target_wns: Option<f64>,
    work_dir: &Path,
    out: Option<&Path>,
) -> Result<()> {
    let snapshot = resolve_snapshot(design)?;
    let mut eco = config.engine.eco;
    if let Some(n) = max_iterations {
        eco.max_iterations = n;
    }
    if let Some(target) = target_wns {
        eco.target_wns_ns = target;
    }

    let adapter = process_toolchain(config.toolchain, work_dir);
    let optimizer = EcoOptimizer::new(adapter, eco).context("Invalid ECO configuration")?;

    println!("Running ECO loop for design: {}", snapshot.name);
    println!("Work directory: {:?}", work_dir);
    println!();

    let result = optimizer
        .run(&snapshot)
        .await
        .context("ECO loop could not start")?;
    METRICS.flush();

    println!("Run ID: {}", result.run_id);
    println!("Stop reason: {:?}", result.stop_reason);
    println!(
        "WNS: {:.3} → {:.3} ns ({:+.3} ns)",
        result.initial_wns_ns,
        result.final_wns_ns,
        result.wns_improvement_ns()
    );
    println!(
        "TNS: {:.3} → {:.3} ns",
        result.initial_tns_ns, result.final_tns_ns
    );
    println!("Duration: {}ms", result.duration_ms);
    println!();

    for it in &result.iterations {
        let status = if it.failed() { "✗" } else { "✓" };
        println!(
            "  {} iteration {} ({:.3} → {:.3} ns, {} fix(es), {}ms)",
            status, it.iteration, it.before_wns_ns, it.after_wns_ns, it.fixes_applied, it.duration_ms
        );
    }

    if !result.remaining_recommendations.is_empty() {
        println!();
        println!("Remaining recommendations:");
        for fix in &result.remaining_recommendations {
            println!(
                "  - [{:?}] {} at {} (~{:.1} ps)",
                fix.priority,
                fix.action.name(),
                fix.location,
                fix.estimated_improvement_ps
            );
        }
    }
    if !result.analysis_conclusive {
        warn!("closing timing analysis was inconclusive");
    }

    if let Some(dir) = out {
        let run_id = result.run_id.to_string();
        let path = write_artifact(&result, &run_id, "eco", dir)?;
        write_markdown(&render_eco_markdown(&result), &run_id, "eco", dir)?;
        println!("\nArtifact written: {:?}", path);
    }

    if result.timing_met {
        println!("\n✓ Timing met");
        Ok(())
    } else if result.success() {
        println!("\n! Converged short of the WNS target");
        Ok(())
    } else {
        anyhow::bail!("Timing not closed ({:?})", result.stop_reason)
    }
}

async fn cmd_signoff(
    config: CliConfig,
    design: &DesignArgs,
    checks: Option<&str>,
    parallel: bool,
    work_dir: &Path,
    out: Option<&Path>,
) -> Result<()> {
    let snapshot = resolve_snapshot(design)?;
    let mut signoff = config.engine.signoff;
    if let Some(list) = checks {
        signoff.enabled_checks = parse_checks(list)?;
    }
    signoff.parallel |= parallel;

    let adapter = process_toolchain(config.toolchain, work_dir);
    let orchestrator =
        SignoffOrchestrator::new(adapter, signoff).context("Invalid signoff configuration")?;

    println!("Running signoff for design: {}", snapshot.name);
    println!();

    let report = orchestrator.run(&snapshot).await;
    METRICS.flush();

    println!("Run ID: {}", report.run_id());
    println!(
        "Status: {}",
        if report.tapeout_ready() {
            "✓ READY"
        } else {
            "✗ NOT READY"
        }
    );
    println!("Duration: {}ms", report.duration_ms());
    println!();

    for check in report.checks() {
        println!(
            "  {} {} ({} violation(s), {}ms){}",
            status_symbol(check.status),
            check.check.display_name(),
            check.violation_count,
            check.duration_ms,
            check
                .details
                .first()
                .map(|d| format!(": {}", d))
                .unwrap_or_default()
        );
    }

    if !report.blockers().is_empty() {
        println!();
        println!("Blockers:");
        for blocker in report.blockers() {
            println!("  - {}", blocker);
        }
    }
    if !report.warnings().is_empty() {
        println!();
        println!("Warnings:");
        for warning in report.warnings() {
            println!("  - {}", warning);
        }
    }

    if let Some(dir) = out {
        let run_id = report.run_id().to_string();
        let path = write_artifact(&report, &run_id, "signoff", dir)?;
        write_markdown(&render_signoff_markdown(&report), &run_id, "signoff", dir)?;
        println!("\nArtifact written: {:?}", path);
    }

    if report.tapeout_ready() {
        println!("\n✓ All signoff checks passed!");
        Ok(())
    } else {
        anyhow::bail!("Signoff failed")
    }
}

/// Artifact run id: evaluation time plus a random suffix.
fn checklist_run_id(checklist: &TapeoutChecklist) -> String {
    format!(
        "checklist-{}-{}",
        checklist.generated_at.timestamp(),
        Uuid::new_v4().simple()
    )
}

fn cmd_checklist(
    config: CliConfig,
    design: Option<&str>,
    run_dir: &Path,
    signoff: Option<&Path>,
    out: Option<&Path>,
) -> Result<()> {
    let run_dir = config
        .engine
        .checklist
        .run_dir
        .clone()
        .filter(|_| run_dir == Path::new("."))
        .unwrap_or_else(|| run_dir.to_path_buf());
    if !run_dir.is_dir() {
        anyhow::bail!("Run directory not found: {:?}", run_dir);
    }

    let report: Option<SignoffReport> = match signoff {
        Some(path) => {
            let (run_id, name, root) = artifact_coordinates(path)?;
            let report = read_artifact(&run_id, &name, &root)
                .with_context(|| format!("Failed to read signoff artifact: {:?}", path))?;
            Some(report)
        }
        None => None,
    };

    let design = match (design, &report) {
        (Some(d), _) => d.to_string(),
        (None, Some(r)) => r.design().to_string(),
        (None, None) => default_design_name(&run_dir),
    };

    let scorer = ReadinessScorer::new(config.engine.checklist, &config.engine.signoff)
        .context("Invalid checklist configuration")?;
    let checklist = scorer.evaluate(&design, &run_dir, report.as_ref());
    let score = &checklist.score;

    println!("Tapeout checklist for design: {}", design);
    println!("Run directory: {:?}", run_dir);
    println!();

    for item in &checklist.items {
        let status = match item.status {
            ChecklistStatus::Pass => "✓",
            ChecklistStatus::Warning => "!",
            ChecklistStatus::NotRun | ChecklistStatus::Skipped => "-",
            ChecklistStatus::Fail => "✗",
        };
        println!(
            "  {} {}{} ({})",
            status,
            item.name,
            if item.required { " [required]" } else { "" },
            item.details
        );
    }

    println!();
    for category in &score.categories {
        println!(
            "  {:<14} {:>5.1}%",
            category.category.name(),
            category.percent
        );
    }
    println!();
    println!("Overall: {:.1} (grade {:?})", score.overall, score.grade);

    if !score.missing_critical.is_empty() {
        println!("Missing critical:");
        for name in &score.missing_critical {
            println!("  - {}", name);
        }
    }

    if let Some(dir) = out {
        let run_id = checklist_run_id(&checklist);
        let path = write_artifact(&checklist, &run_id, "checklist", dir)?;
        write_markdown(&render_checklist_markdown(&checklist), &run_id, "checklist", dir)?;
        println!("\nArtifact written: {:?}", path);
    }

    info!(
        design = %design,
        overall = score.overall,
        ready = score.tapeout_ready,
        "checklist evaluated"
    );
    if score.tapeout_ready {
        println!("\n✓ Ready for tapeout");
        Ok(())
    } else {
        anyhow::bail!("Not ready for tapeout (score {:.1})", score.overall)
    }
}

fn cmd_foundry(run_dir: &Path) -> Result<()> {
    if !run_dir.is_dir() {
        anyhow::bail!("Run directory not found: {:?}", run_dir);
    }
    let foundry = check_foundry_readiness(run_dir);

    println!("Foundry deliverables in {:?}:", run_dir);
    for d in &foundry.deliverables {
        let status = if d.present {
            "✓"
        } else if d.required {
            "✗"
        } else {
            "-"
        };
        println!(
            "  {} {}{} {}",
            status,
            d.name,
            if d.required { " [required]" } else { "" },
            d.path.as_deref().unwrap_or("")
        );
    }

    let gds = &foundry.gds;
    println!();
    println!(
        "GDS: {} ({} bytes, header {}, endlib {})",
        gds.path.as_deref().unwrap_or("missing"),
        gds.size_bytes,
        if gds.valid_header { "ok" } else { "bad" },
        if gds.has_endlib { "ok" } else { "missing" }
    );
    for warning in &foundry.warnings {
        println!("  ! {}", warning);
    }

    if foundry.gds_ready {
        println!("\n✓ GDS ready for submission");
        Ok(())
    } else {
        anyhow::bail!(
            "GDS not ready (missing: {})",
            foundry.missing_required().join(", ")
        )
    }
}

fn read_report(path: Option<&Path>) -> Result<Option<String>> {
    path.map(|p| {
        std::fs::read_to_string(p).with_context(|| format!("Failed to read report: {:?}", p))
    })
    .transpose()
}

fn cmd_recommend(
    config: CliConfig,
    setup: Option<&Path>,
    hold: Option<&Path>,
    design: &str,
    script: Option<&Path>,
) -> Result<()> {
    if setup.is_none() && hold.is_none() {
        anyhow::bail!("Pass at least one of --setup or --hold");
    }
    let setup_text = read_report(setup)?;
    let hold_text = read_report(hold)?;

    let analysis = TimingAnalysis::from_reports(setup_text.as_deref(), hold_text.as_deref());
    let violations = analysis.violations();
    let fixes = recommend_fixes(&violations, &config.engine.eco);

    println!("Violations: {}", violations.len());
    if !analysis.is_conclusive() {
        if setup.is_some() && !analysis.setup.is_parsed() {
            println!("  ! setup report not understood");
        }
        if hold.is_some() && !analysis.hold.is_parsed() {
            println!("  ! hold report not understood");
        }
    }
    println!();

    for fix in &fixes {
        println!(
            "  [{:?}] {} at {} (~{:.1} ps): {}",
            fix.priority,
            fix.action.name(),
            fix.location,
            fix.estimated_improvement_ps,
            fix.repair.to_tcl()
        );
    }

    if let Some(path) = script {
        std::fs::write(path, render_eco_script(design, &fixes))
            .with_context(|| format!("Failed to write ECO script to {:?}", path))?;
        println!("\nECO script written: {:?}", path);
    }
    Ok(())
}

fn cmd_effort(wns: f64, tns: f64, cells: u64) -> Result<()> {
    if !wns.is_finite() || !tns.is_finite() {
        anyhow::bail!("WNS and TNS must be finite");
    }
    let effort = estimate_closure_effort(wns, tns, cells);

    println!("Difficulty: {}", effort.difficulty.name());
    println!("Estimated iterations: {}", effort.estimated_iterations);
    if !effort.recommendations.is_empty() {
        println!("Recommendations:");
        for r in &effort.recommendations {
            println!("  - {}", r);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapeout_core::fakes::FakeToolchain;
    use tapeout_core::{CheckOutcome, SignoffConfig};

    const SETUP_REPORT: &str = "\
Startpoint: in_a (input port clocked by clk)
Endpoint: core/r1 (rising edge-triggered flip-flop clocked by clk)
Path Group: clk
Path Type: max

  -0.80   slack (VIOLATED)
";

    #[test]
    fn test_parse_eco_command() {
        let cli = Cli::try_parse_from([
            "tapeout",
            "-v",
            "eco",
            "--design",
            "top",
            "--run-dir",
            "runs/final",
            "--target-wns",
            "-0.05",
            "--max-iterations",
            "4",
        ])
        .expect("parse");
        assert!(cli.verbose);
        match cli.command {
            Commands::Eco {
                design,
                max_iterations,
                target_wns,
                work_dir,
                out,
            } => {
                assert_eq!(design.design.as_deref(), Some("top"));
                assert_eq!(design.run_dir, Some(PathBuf::from("runs/final")));
                assert_eq!(max_iterations, Some(4));
                assert_eq!(target_wns, Some(-0.05));
                assert_eq!(work_dir, PathBuf::from(DEFAULT_WORK_DIR));
                assert!(out.is_none());
            }
            _ => panic!("expected eco"),
        }
    }

    #[test]
    fn test_snapshot_conflicts_with_run_dir() {
        let result = Cli::try_parse_from([
            "tapeout",
            "signoff",
            "--run-dir",
            "runs/final",
            "--snapshot",
            "top.toml",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_checks() {
        assert_eq!(
            parse_checks("drc, LVS,ir_drop").expect("checks"),
            vec![CheckKind::Drc, CheckKind::Lvs, CheckKind::IrDrop]
        );
        assert!(parse_checks("drc,erc").is_err());
    }

    #[test]
    fn test_discover_snapshot_prefers_design_named_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        std::fs::create_dir_all(root.join("results")).expect("mkdir");
        for name in [
            "results/top.odb",
            "results/other.def",
            "results/top.def",
            "results/top.v",
            "results/top.sdc",
            "results/top.gds",
            "lib/a.lib",
            "lib/b.lib",
            "lib/tech.lef",
        ] {
            let path = root.join(name);
            std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            std::fs::write(path, b"x").expect("write");
        }

        let snapshot = discover_snapshot("top", root).expect("snapshot");
        assert_eq!(snapshot.name, "top");
        assert_eq!(snapshot.odb, Some(root.join("results/top.odb")));
        assert_eq!(snapshot.def, Some(root.join("results/top.def")));
        assert_eq!(snapshot.gds, Some(root.join("results/top.gds")));
        assert!(snapshot.spef.is_none());
        assert_eq!(snapshot.liberty.len(), 2);
        assert_eq!(snapshot.lef.len(), 1);
    }

    #[test]
    fn test_discover_snapshot_accepts_vg_netlist() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("top.vg"), b"module top(); endmodule\n").expect("write");
        std::fs::write(dir.path().join("top.gds2"), b"x").expect("write");

        let snapshot = discover_snapshot("top", dir.path()).expect("snapshot");
        assert_eq!(snapshot.netlist, Some(dir.path().join("top.vg")));
        assert_eq!(snapshot.gds, Some(dir.path().join("top.gds2")));
    }

    #[test]
    fn test_discover_snapshot_needs_a_design_view() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("cells.lib"), b"x").expect("write");
        let err = discover_snapshot("top", dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("No odb, def or netlist"));
    }

    #[test]
    fn test_load_config_with_toolchain_section() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tapeout.toml");
        std::fs::write(
            &path,
            r#"
[eco]
max_iterations = 3

[signoff]
enabled_checks = ["drc", "timing"]

[toolchain]
openroad = ["docker", "exec", "pdk", "openroad"]
timeout_secs = 600
"#,
        )
        .expect("write");

        let config = load_config(Some(&path)).expect("config");
        assert_eq!(config.engine.eco.max_iterations, 3);
        assert_eq!(
            config.engine.signoff.enabled_checks,
            vec![CheckKind::Drc, CheckKind::Timing]
        );
        assert_eq!(config.toolchain.openroad[0], "docker");
        assert_eq!(config.toolchain.timeout_secs, 600);
        assert_eq!(config.toolchain.magic, vec!["magic".to_string()]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tapeout.toml");
        std::fs::write(&path, "[eco]\nmax_iterations = 0\n").expect("write");
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_artifact_coordinates() {
        let (run_id, name, root) =
            artifact_coordinates(Path::new("/out/1234/signoff.json")).expect("coordinates");
        assert_eq!(run_id, "1234");
        assert_eq!(name, "signoff");
        assert_eq!(root, PathBuf::from("/out"));
    }

    async fn signoff_artifact(out: &Path) -> PathBuf {
        let fake = FakeToolchain::new()
            .with_check(CheckKind::Drc, CheckOutcome::with_count(0))
            .with_check(CheckKind::Lvs, CheckOutcome::with_count(0).with_match(true));
        let orchestrator = SignoffOrchestrator::new(
            Arc::new(fake),
            SignoffConfig::only(&[CheckKind::Drc, CheckKind::Lvs]),
        )
        .expect("orchestrator");
        let report = orchestrator
            .run(&DesignSnapshot::new("top", out))
            .await;
        write_artifact(&report, &report.run_id().to_string(), "signoff", out).expect("artifact")
    }

    #[tokio::test]
    async fn test_checklist_reads_verified_signoff_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let run_dir = dir.path().join("run");
        std::fs::create_dir_all(&run_dir).expect("mkdir");
        let artifact = signoff_artifact(&dir.path().join("out")).await;

        // An empty run directory is not ready, but the artifact itself loads.
        let err = cmd_checklist(
            CliConfig::default(),
            None,
            &run_dir,
            Some(&artifact),
            None,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("Not ready for tapeout"));
    }

    #[test]
    fn test_checklist_runs_in_the_same_second_keep_their_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let run_dir = dir.path().join("run");
        let out = dir.path().join("out");
        std::fs::create_dir_all(&run_dir).expect("mkdir");

        for _ in 0..2 {
            let _ = cmd_checklist(CliConfig::default(), Some("top"), &run_dir, None, Some(&out));
        }
        let artifacts: Vec<_> = collect_files(&out)
            .into_iter()
            .filter(|p| p.file_name().is_some_and(|n| n == "checklist.json"))
            .collect();
        assert_eq!(artifacts.len(), 2, "{artifacts:?}");
        for path in &artifacts {
            let run_id = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .expect("run id");
            assert!(run_id.starts_with("checklist-"), "{run_id}");
        }
    }

    #[tokio::test]
    async fn test_checklist_rejects_tampered_signoff_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifact = signoff_artifact(&dir.path().join("out")).await;
        let mut bytes = std::fs::read(&artifact).expect("read");
        bytes.push(b'\n');
        std::fs::write(&artifact, bytes).expect("write");

        let err = cmd_checklist(
            CliConfig::default(),
            Some("top"),
            dir.path(),
            Some(&artifact),
            None,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read signoff artifact"));
    }

    #[test]
    fn test_recommend_writes_script() {
        let dir = tempfile::tempdir().expect("tempdir");
        let setup = dir.path().join("setup.rpt");
        let script = dir.path().join("eco.tcl");
        std::fs::write(&setup, SETUP_REPORT).expect("write");

        cmd_recommend(
            CliConfig::default(),
            Some(&setup),
            None,
            "top",
            Some(&script),
        )
        .expect("recommend");
        let text = std::fs::read_to_string(&script).expect("script");
        assert!(text.starts_with("# ECO script for top"));
        assert!(text.contains("repair_timing -setup"));
    }

    #[test]
    fn test_recommend_needs_a_report() {
        assert!(cmd_recommend(CliConfig::default(), None, None, "top", None).is_err());
    }

    #[test]
    fn test_foundry_empty_run_is_not_ready() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = cmd_foundry(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("GDS not ready"));
    }

    #[test]
    fn test_effort_rejects_non_finite() {
        assert!(cmd_effort(f64::NAN, 0.0, 0).is_err());
        assert!(cmd_effort(-0.8, -12.0, 50_000).is_ok());
    }
}
