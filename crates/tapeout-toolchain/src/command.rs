//! Tool command catalog and launcher configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tapeout_core::CheckKind;

/// CAD tools the process toolchain drives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinTool {
    /// Static timing analysis: `sta -no_init -exit <script>`
    OpenSta,

    /// Repair, antenna and IR-drop analysis: `openroad -no_init -exit <script>`
    OpenRoad,

    /// DRC and layout extraction: `magic -dnull -noconsole <script>`
    Magic,

    /// LVS comparison: `netgen -batch source <script>`
    Netgen,
}

impl BuiltinTool {
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinTool::OpenSta => "opensta",
            BuiltinTool::OpenRoad => "openroad",
            BuiltinTool::Magic => "magic",
            BuiltinTool::Netgen => "netgen",
        }
    }

    /// Arguments placed between the launcher and the script path.
    fn script_args(&self) -> &'static [&'static str] {
        match self {
            BuiltinTool::OpenSta | BuiltinTool::OpenRoad => &["-no_init", "-exit"],
            BuiltinTool::Magic => &["-dnull", "-noconsole"],
            BuiltinTool::Netgen => &["-batch", "source"],
        }
    }

    /// Tool that runs a signoff check.
    pub fn for_check(check: CheckKind) -> Self {
        match check {
            CheckKind::Drc => BuiltinTool::Magic,
            CheckKind::Lvs => BuiltinTool::Netgen,
            CheckKind::Antenna | CheckKind::IrDrop | CheckKind::Timing => BuiltinTool::OpenRoad,
        }
    }
}

/// Launch prefixes and tool inputs that do not travel with the design.
///
/// Each launcher is a command prefix, so tools can run through a wrapper
/// (`["docker", "exec", "pdk", "openroad"]`) as well as directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolchainSettings {
    pub sta: Vec<String>,
    pub openroad: Vec<String>,
    pub magic: Vec<String>,
    pub netgen: Vec<String>,

    /// Magic technology rc file.
    pub magic_rcfile: Option<PathBuf>,

    /// Netgen technology setup file.
    pub netgen_setup: Option<PathBuf>,

    /// Supply net analysed for IR drop.
    pub power_net: String,

    /// Paths listed per timing report.
    pub path_count: u32,

    /// Budget per tool invocation; 0 disables the bound.
    pub timeout_secs: u64,
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            sta: vec!["sta".to_string()],
            openroad: vec!["openroad".to_string()],
            magic: vec!["magic".to_string()],
            netgen: vec!["netgen".to_string()],
            magic_rcfile: None,
            netgen_setup: None,
            power_net: "VDD".to_string(),
            path_count: 100,
            timeout_secs: 3600,
        }
    }
}

impl ToolchainSettings {
    pub fn launcher(&self, tool: BuiltinTool) -> &[String] {
        match tool {
            BuiltinTool::OpenSta => &self.sta,
            BuiltinTool::OpenRoad => &self.openroad,
            BuiltinTool::Magic => &self.magic,
            BuiltinTool::Netgen => &self.netgen,
        }
    }
}

/// One tool invocation, ready to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCommand {
    /// Label used in logs and errors (e.g. `openroad:repair_timing`).
    pub name: String,

    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// Directory the tool runs in.
    pub working_dir: Option<PathBuf>,

    /// Timeout in seconds; 0 disables the bound.
    pub timeout_secs: u64,
}

impl ToolCommand {
    /// Run `script` with a builtin tool through its configured launcher.
    pub fn from_builtin(
        tool: BuiltinTool,
        operation: &str,
        script: &Path,
        settings: &ToolchainSettings,
    ) -> Self {
        let mut command = settings.launcher(tool).to_vec();
        if tool == BuiltinTool::Magic {
            if let Some(rc) = &settings.magic_rcfile {
                command.push("-rcfile".to_string());
                command.push(rc.display().to_string());
            }
        }
        command.extend(tool.script_args().iter().map(|a| a.to_string()));
        command.push(script.display().to_string());

        Self {
            name: format!("{}:{}", tool.name(), operation),
            command,
            working_dir: script.parent().map(Path::to_path_buf),
            timeout_secs: settings.timeout_secs,
        }
    }

    pub fn custom(name: String, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name,
            command,
            working_dir: None,
            timeout_secs,
        }
    }
}
