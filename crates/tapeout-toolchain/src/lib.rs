//! Tapeout Toolchain - process-backed CAD tool adapter
//!
//! Implements [`tapeout_core::ToolchainAdapter`] by generating TCL scripts
//! and running them through the open-source flow tools:
//! - OpenSTA / OpenROAD for timing reports, `repair_timing`, antenna and IR drop
//! - Magic for DRC and layout extraction
//! - Netgen for LVS comparison

pub mod adapter;
pub mod command;
pub mod runner;
pub mod scripts;

// Re-export key types
pub use adapter::ProcessToolchain;
pub use command::{BuiltinTool, ToolCommand, ToolchainSettings};
pub use runner::{ToolOutput, ToolRunner};
pub use scripts::DesignSource;
