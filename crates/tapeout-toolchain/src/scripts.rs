//! TCL script generation for the builtin tools.
//!
//! Scripts are pure functions of the snapshot and options so they can be
//! inspected and tested without any tool installed.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tapeout_core::{DesignSnapshot, PathType, RepairOptions, ToolchainError};

use crate::command::BuiltinTool;

/// Brace-quote a path for TCL.
fn tcl(path: &Path) -> String {
    format!("{{{}}}", path.display())
}

/// Where the tool should load the design from.
#[derive(Debug, Clone, PartialEq)]
pub enum DesignSource {
    /// OpenDB database (ECO output or the snapshot's own).
    Odb(PathBuf),
    Def(PathBuf),
    /// Gate-level netlist only; timing runs in standalone OpenSTA.
    Netlist(PathBuf),
}

impl DesignSource {
    /// Prefer a current ECO database, then the snapshot odb, DEF, netlist.
    ///
    /// The caller decides whether `eco_odb` still belongs to `snapshot`.
    pub fn select(
        snapshot: &DesignSnapshot,
        eco_odb: Option<&Path>,
    ) -> Result<Self, ToolchainError> {
        if let Some(eco_odb) = eco_odb {
            return Ok(DesignSource::Odb(eco_odb.to_path_buf()));
        }
        if let Some(odb) = &snapshot.odb {
            return Ok(DesignSource::Odb(odb.clone()));
        }
        if let Some(def) = &snapshot.def {
            return Ok(DesignSource::Def(def.clone()));
        }
        if let Some(netlist) = &snapshot.netlist {
            return Ok(DesignSource::Netlist(netlist.clone()));
        }
        Err(ToolchainError::Unavailable(format!(
            "design '{}' has no odb, def or netlist",
            snapshot.name
        )))
    }

    /// Tool that can analyse this source.
    pub fn timing_tool(&self) -> BuiltinTool {
        match self {
            DesignSource::Netlist(_) => BuiltinTool::OpenSta,
            DesignSource::Odb(_) | DesignSource::Def(_) => BuiltinTool::OpenRoad,
        }
    }

    fn require_physical(&self, operation: &str) -> Result<(), ToolchainError> {
        match self {
            DesignSource::Netlist(_) => Err(ToolchainError::Unavailable(format!(
                "{} needs a placed design (odb or def)",
                operation
            ))),
            _ => Ok(()),
        }
    }
}

fn load_design(snapshot: &DesignSnapshot, source: &DesignSource) -> String {
    let mut s = String::new();
    let physical = !matches!(source, DesignSource::Netlist(_));
    if physical {
        for lef in &snapshot.lef {
            let _ = writeln!(s, "read_lef {}", tcl(lef));
        }
    }
    for lib in &snapshot.liberty {
        let _ = writeln!(s, "read_liberty {}", tcl(lib));
    }
    match source {
        DesignSource::Odb(odb) => {
            let _ = writeln!(s, "read_db {}", tcl(odb));
        }
        DesignSource::Def(def) => {
            let _ = writeln!(s, "read_def {}", tcl(def));
        }
        DesignSource::Netlist(netlist) => {
            let _ = writeln!(s, "read_verilog {}", tcl(netlist));
            let _ = writeln!(s, "link_design {}", snapshot.name);
        }
    }
    if let Some(sdc) = &snapshot.sdc {
        let _ = writeln!(s, "read_sdc {}", tcl(sdc));
    }
    match &snapshot.spef {
        Some(spef) => {
            let _ = writeln!(s, "read_spef {}", tcl(spef));
        }
        None if physical => s.push_str("estimate_parasitics -placement\n"),
        None => {}
    }
    s
}

/// `report_checks` for one path type, violating paths only.
pub fn timing_report_script(
    snapshot: &DesignSnapshot,
    source: &DesignSource,
    path_type: PathType,
    path_count: u32,
) -> String {
    let mut s = load_design(snapshot, source);
    let _ = writeln!(
        s,
        "report_checks -path_delay {} -slack_max 0 -group_count {} -endpoint_count 1 -format full -digits 3",
        path_type.path_delay(),
        path_count
    );
    s
}

/// `-sequence` argument for the enabled setup transforms.
fn setup_sequence(options: &RepairOptions) -> Vec<&'static str> {
    let mut sequence = Vec::new();
    if options.enable_gate_sizing {
        sequence.push("sizeup");
    }
    if options.enable_vt_swap {
        sequence.push("vt_swap");
    }
    if options.enable_pin_swap {
        sequence.push("swap_pins");
    }
    if options.enable_gate_cloning {
        sequence.push("clone");
    }
    sequence
}

/// Repair (unless measure-only), report WNS/TNS, and save the ECO database.
pub fn repair_script(
    snapshot: &DesignSnapshot,
    source: &DesignSource,
    options: &RepairOptions,
    eco_odb: &Path,
) -> Result<String, ToolchainError> {
    source.require_physical("repair_timing")?;
    let mut s = load_design(snapshot, source);

    if options.repair_setup {
        let sequence = setup_sequence(options);
        if !sequence.is_empty() {
            let _ = writeln!(
                s,
                "repair_timing -setup -setup_margin {} -max_utilization {} -sequence {}",
                options.setup_margin_ns,
                options.max_utilization_pct,
                sequence.join(",")
            );
        }
    }
    if options.repair_hold && options.enable_buffer_insertion {
        let _ = writeln!(
            s,
            "repair_timing -hold -hold_margin {} -max_utilization {}",
            options.hold_margin_ns, options.max_utilization_pct
        );
    }

    s.push_str("report_wns\nreport_tns\n");
    if !options.is_measure_only() {
        let _ = writeln!(s, "write_db {}", tcl(eco_odb));
    }
    Ok(s)
}

/// WNS/TNS plus the violating setup paths, for the timing signoff check.
pub fn timing_check_script(
    snapshot: &DesignSnapshot,
    source: &DesignSource,
    path_count: u32,
) -> String {
    let mut s = load_design(snapshot, source);
    s.push_str("report_wns\nreport_tns\n");
    let _ = writeln!(
        s,
        "report_checks -path_delay max -slack_max 0 -group_count {} -endpoint_count 1 -format full -digits 3",
        path_count
    );
    s
}

pub fn antenna_script(
    snapshot: &DesignSnapshot,
    source: &DesignSource,
) -> Result<String, ToolchainError> {
    source.require_physical("check_antennas")?;
    let mut s = load_design(snapshot, source);
    s.push_str("check_antennas -verbose\n");
    Ok(s)
}

pub fn ir_drop_script(
    snapshot: &DesignSnapshot,
    source: &DesignSource,
    power_net: &str,
) -> Result<String, ToolchainError> {
    source.require_physical("analyze_power_grid")?;
    let mut s = load_design(snapshot, source);
    let _ = writeln!(s, "analyze_power_grid -net {}", power_net);
    Ok(s)
}

fn magic_load(snapshot: &DesignSnapshot) -> Result<String, ToolchainError> {
    let mut s = String::new();
    if let Some(gds) = &snapshot.gds {
        let _ = writeln!(s, "gds read {}", tcl(gds));
    } else if let Some(def) = &snapshot.def {
        for lef in &snapshot.lef {
            let _ = writeln!(s, "lef read {}", tcl(lef));
        }
        let _ = writeln!(s, "def read {}", tcl(def));
    } else {
        return Err(ToolchainError::Unavailable(format!(
            "design '{}' has no gds or def for magic",
            snapshot.name
        )));
    }
    let _ = writeln!(s, "load {}", snapshot.name);
    s.push_str("select top cell\n");
    Ok(s)
}

/// Full-chip DRC; prints `Total DRC errors found: N`.
pub fn drc_script(snapshot: &DesignSnapshot) -> Result<String, ToolchainError> {
    let mut s = magic_load(snapshot)?;
    s.push_str("drc euclidean on\ndrc style drc(full)\ndrc check\ndrc catchup\n");
    s.push_str("drc count total\nquit -noprompt\n");
    Ok(s)
}

/// Layout extraction to a SPICE netlist for LVS.
pub fn extract_script(snapshot: &DesignSnapshot, spice: &Path) -> Result<String, ToolchainError> {
    let mut s = magic_load(snapshot)?;
    s.push_str("extract all\next2spice lvs\n");
    let _ = writeln!(s, "ext2spice -o {}", tcl(spice));
    s.push_str("quit -noprompt\n");
    Ok(s)
}

pub fn lvs_script(
    snapshot: &DesignSnapshot,
    spice: &Path,
    setup: &Path,
    report: &Path,
) -> Result<String, ToolchainError> {
    let Some(netlist) = &snapshot.netlist else {
        return Err(ToolchainError::Unavailable(format!(
            "design '{}' has no netlist for LVS",
            snapshot.name
        )));
    };
    Ok(format!(
        "lvs {{{} {}}} {{{} {}}} {} {}\nquit\n",
        spice.display(),
        snapshot.name,
        netlist.display(),
        snapshot.name,
        tcl(setup),
        tcl(report)
    ))
}
