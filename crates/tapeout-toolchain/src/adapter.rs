//! Process-backed [`ToolchainAdapter`].
//!
//! Each call writes a TCL script under `<work_dir>/<design>/`, runs the
//! matching tool through [`ToolRunner`], keeps the tool log next to the
//! script and parses it with the core report parsers. Repairs save the
//! modified design to `<design>.eco.odb` and record which snapshot database
//! it was derived from in `<design>.eco.origin`. Later calls load the ECO
//! database only while that snapshot database is unchanged, and a baseline
//! measurement discards it so every ECO run starts from the snapshot.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::Context;
use async_trait::async_trait;
use tapeout_core::report_parser::{
    parse_antenna_violations, parse_drc_count, parse_lvs_match, parse_path_report,
    parse_repair_changes, parse_timing_summary, parse_worst_ir_drop_mv,
};
use tapeout_core::{
    CheckKind, CheckLimits, CheckOutcome, DesignSnapshot, ParseOutcome, PathType, RepairOptions,
    RepairOutcome, ToolchainAdapter, ToolchainError, REPAIR_FAILURE_SENTINEL_NS,
};
use tracing::{debug, warn};

use crate::command::{BuiltinTool, ToolCommand, ToolchainSettings};
use crate::runner::{ToolOutput, ToolRunner};
use crate::scripts::{self, DesignSource};

pub struct ProcessToolchain {
    settings: ToolchainSettings,
    work_dir: PathBuf,
}

impl ProcessToolchain {
    pub fn new(settings: ToolchainSettings, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            work_dir: work_dir.into(),
        }
    }

    /// Per-design directory holding scripts, logs and the ECO database.
    pub fn design_dir(&self, snapshot: &DesignSnapshot) -> PathBuf {
        self.work_dir.join(&snapshot.name)
    }

    pub fn eco_odb(&self, snapshot: &DesignSnapshot) -> PathBuf {
        self.design_dir(snapshot)
            .join(format!("{}.eco.odb", snapshot.name))
    }

    fn eco_origin(&self, snapshot: &DesignSnapshot) -> PathBuf {
        self.design_dir(snapshot)
            .join(format!("{}.eco.origin", snapshot.name))
    }

    /// The ECO database, if it was derived from the snapshot as it is now.
    fn current_eco_odb(&self, snapshot: &DesignSnapshot) -> Option<PathBuf> {
        let eco_odb = self.eco_odb(snapshot);
        if !eco_odb.is_file() {
            return None;
        }
        let recorded = std::fs::read_to_string(self.eco_origin(snapshot)).ok();
        match (recorded, snapshot_fingerprint(snapshot)) {
            (Some(recorded), Some(current)) if recorded.trim() == current => Some(eco_odb),
            _ => {
                debug!(
                    design = %snapshot.name,
                    path = %eco_odb.display(),
                    "ignoring ECO database from another snapshot"
                );
                None
            }
        }
    }

    /// Remove the ECO database and its origin record.
    pub fn discard_eco_database(&self, snapshot: &DesignSnapshot) -> anyhow::Result<()> {
        for path in [self.eco_odb(snapshot), self.eco_origin(snapshot)] {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed ECO state"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("removing {}", path.display()));
                }
            }
        }
        Ok(())
    }

    fn record_eco_origin(&self, snapshot: &DesignSnapshot) -> anyhow::Result<()> {
        match snapshot_fingerprint(snapshot) {
            Some(fingerprint) => {
                self.write_file(snapshot, &format!("{}.eco.origin", snapshot.name), &fingerprint)?;
            }
            None => warn!(
                design = %snapshot.name,
                "snapshot database missing; ECO database will not be reused"
            ),
        }
        Ok(())
    }

    fn source(&self, snapshot: &DesignSnapshot) -> Result<DesignSource, ToolchainError> {
        DesignSource::select(snapshot, self.current_eco_odb(snapshot).as_deref())
    }

    fn write_file(&self, snapshot: &DesignSnapshot, file: &str, body: &str) -> anyhow::Result<PathBuf> {
        let dir = self.design_dir(snapshot);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating {}", dir.display()))?;
        let path = dir.join(file);
        std::fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Write `body` as `<operation>.tcl`, run it, and keep the output as
    /// `<operation>.log`.
    async fn run_script(
        &self,
        tool: BuiltinTool,
        operation: &str,
        snapshot: &DesignSnapshot,
        body: &str,
    ) -> Result<(ToolOutput, Option<PathBuf>), ToolchainError> {
        let script = self
            .write_file(snapshot, &format!("{}.tcl", operation), body)
            .map_err(|e| ToolchainError::invocation(tool.name(), format!("{:#}", e)))?;
        let command = ToolCommand::from_builtin(tool, operation, &script, &self.settings);
        let output = ToolRunner::execute_checked(&command).await?;

        let log = match self.write_file(snapshot, &format!("{}.log", operation), &output.combined())
        {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(operation = operation, error = %format!("{:#}", e), "tool log not saved");
                None
            }
        };
        Ok((output, log))
    }

    async fn check_drc(&self, snapshot: &DesignSnapshot) -> Result<CheckOutcome, ToolchainError> {
        let script = scripts::drc_script(snapshot)?;
        let (output, log) = self
            .run_script(BuiltinTool::Magic, "drc", snapshot, &script)
            .await?;
        let count = expect_parsed(BuiltinTool::Magic, parse_drc_count(&output.combined()))?;
        Ok(with_log(CheckOutcome::with_count(count), log))
    }

    async fn check_lvs(&self, snapshot: &DesignSnapshot) -> Result<CheckOutcome, ToolchainError> {
        let Some(setup) = self.settings.netgen_setup.clone() else {
            return Err(ToolchainError::Unavailable(
                "netgen_setup is not configured".to_string(),
            ));
        };
        let dir = self.design_dir(snapshot);
        let spice = dir.join(format!("{}.spice", snapshot.name));
        let report = dir.join("lvs.out");

        let extract = scripts::extract_script(snapshot, &spice)?;
        self.run_script(BuiltinTool::Magic, "extract", snapshot, &extract)
            .await?;

        let script = scripts::lvs_script(snapshot, &spice, &setup, &report)?;
        let (output, log) = self
            .run_script(BuiltinTool::Netgen, "lvs", snapshot, &script)
            .await?;

        // The comparison report carries the verdict; fall back to the log.
        let text = std::fs::read_to_string(&report).unwrap_or_else(|_| output.combined());
        let matched = expect_parsed(BuiltinTool::Netgen, parse_lvs_match(&text))?;
        let outcome = if matched {
            CheckOutcome::with_count(0).with_match(true)
        } else {
            CheckOutcome::with_count(1)
                .with_match(false)
                .with_detail(format!("see {}", report.display()))
        };
        let report_path = if report.is_file() { Some(report) } else { log };
        Ok(with_log(outcome, report_path))
    }

    async fn check_antenna(
        &self,
        snapshot: &DesignSnapshot,
    ) -> Result<CheckOutcome, ToolchainError> {
        let script = scripts::antenna_script(snapshot, &self.source(snapshot)?)?;
        let (output, log) = self
            .run_script(BuiltinTool::OpenRoad, "antenna", snapshot, &script)
            .await?;
        let count = expect_parsed(
            BuiltinTool::OpenRoad,
            parse_antenna_violations(&output.combined()),
        )?;
        Ok(with_log(CheckOutcome::with_count(count), log))
    }

    async fn check_ir_drop(
        &self,
        snapshot: &DesignSnapshot,
    ) -> Result<CheckOutcome, ToolchainError> {
        let script =
            scripts::ir_drop_script(snapshot, &self.source(snapshot)?, &self.settings.power_net)?;
        let (output, log) = self
            .run_script(BuiltinTool::OpenRoad, "ir_drop", snapshot, &script)
            .await?;

        // A missing measurement is judged by the orchestrator, not here.
        let mut outcome = CheckOutcome::default();
        match parse_worst_ir_drop_mv(&output.combined()) {
            ParseOutcome::Parsed(mv) => outcome = outcome.with_metric(mv),
            other => debug!(outcome = ?other, "no IR drop figure in output"),
        }
        Ok(with_log(outcome, log))
    }

    async fn check_timing(
        &self,
        snapshot: &DesignSnapshot,
    ) -> Result<CheckOutcome, ToolchainError> {
        let source = self.source(snapshot)?;
        let tool = source.timing_tool();
        let script = scripts::timing_check_script(snapshot, &source, self.settings.path_count);
        let (output, log) = self
            .run_script(tool, "timing", snapshot, &script)
            .await?;

        let text = output.combined();
        let violations = parse_path_report(&text, PathType::Setup)
            .map(|paths| paths.len() as u32)
            .parsed()
            .unwrap_or(0);
        let mut outcome = CheckOutcome::with_count(violations);
        if let Some(summary) = parse_timing_summary(&text).parsed() {
            outcome = outcome
                .with_metric(summary.wns_ns)
                .with_detail(format!("TNS {:.3} ns", summary.tns_ns));
        }
        Ok(with_log(outcome, log))
    }
}

/// Identity of the database an ECO run starts from: path, size and mtime.
fn snapshot_fingerprint(snapshot: &DesignSnapshot) -> Option<String> {
    let base = snapshot
        .odb
        .as_ref()
        .or(snapshot.def.as_ref())
        .or(snapshot.netlist.as_ref())?;
    let meta = std::fs::metadata(base).ok()?;
    let modified = meta.modified().ok()?.duration_since(UNIX_EPOCH).ok()?;
    Some(format!(
        "{} {} {}",
        base.display(),
        meta.len(),
        modified.as_nanos()
    ))
}

fn expect_parsed<T>(tool: BuiltinTool, outcome: ParseOutcome<T>) -> Result<T, ToolchainError> {
    match outcome {
        ParseOutcome::Parsed(value) => Ok(value),
        ParseOutcome::Unavailable => Err(ToolchainError::invocation(tool.name(), "empty output")),
        ParseOutcome::Malformed(reason) => Err(ToolchainError::invocation(
            tool.name(),
            format!("unreadable output: {}", reason),
        )),
    }
}

fn with_log(mut outcome: CheckOutcome, log: Option<PathBuf>) -> CheckOutcome {
    outcome.report_path = log.as_deref().map(|p: &Path| p.display().to_string());
    outcome
}

#[async_trait]
impl ToolchainAdapter for ProcessToolchain {
    async fn run_timing_analysis(
        &self,
        snapshot: &DesignSnapshot,
        path_type: PathType,
    ) -> Result<String, ToolchainError> {
        let source = self.source(snapshot)?;
        let script = scripts::timing_report_script(
            snapshot,
            &source,
            path_type,
            self.settings.path_count,
        );
        let operation = format!("report_{}", path_type.name());
        let (output, _) = self
            .run_script(source.timing_tool(), &operation, snapshot, &script)
            .await?;
        Ok(output.stdout)
    }

    async fn apply_repair(
        &self,
        snapshot: &DesignSnapshot,
        options: &RepairOptions,
    ) -> Result<RepairOutcome, ToolchainError> {
        let measure_only = options.is_measure_only();
        if measure_only {
            self.discard_eco_database(snapshot).map_err(|e| {
                ToolchainError::invocation(BuiltinTool::OpenRoad.name(), format!("{:#}", e))
            })?;
        }
        let eco_odb = self.eco_odb(snapshot);
        let source = self.source(snapshot)?;
        let script = scripts::repair_script(snapshot, &source, options, &eco_odb)?;
        let operation = if measure_only { "measure" } else { "repair_timing" };
        let (output, _) = self
            .run_script(BuiltinTool::OpenRoad, operation, snapshot, &script)
            .await?;
        if !measure_only && eco_odb.is_file() {
            self.record_eco_origin(snapshot).map_err(|e| {
                ToolchainError::invocation(BuiltinTool::OpenRoad.name(), format!("{:#}", e))
            })?;
        }

        let text = output.combined();
        match parse_timing_summary(&text) {
            ParseOutcome::Parsed(m) => Ok(RepairOutcome {
                wns_ns: m.wns_ns,
                tns_ns: m.tns_ns,
                changes_applied: parse_repair_changes(&text),
            }),
            other => {
                warn!(design = %snapshot.name, outcome = ?other, "repair output had no WNS/TNS");
                Ok(RepairOutcome {
                    wns_ns: REPAIR_FAILURE_SENTINEL_NS,
                    tns_ns: 0.0,
                    changes_applied: 0,
                })
            }
        }
    }

    async fn run_check(
        &self,
        check: CheckKind,
        snapshot: &DesignSnapshot,
        _limits: &CheckLimits,
    ) -> Result<CheckOutcome, ToolchainError> {
        debug!(check = check.name(), tool = BuiltinTool::for_check(check).name(), "running check");
        match check {
            CheckKind::Drc => self.check_drc(snapshot).await,
            CheckKind::Lvs => self.check_lvs(snapshot).await,
            CheckKind::Antenna => self.check_antenna(snapshot).await,
            CheckKind::IrDrop => self.check_ir_drop(snapshot).await,
            CheckKind::Timing => self.check_timing(snapshot).await,
        }
    }
}
