//! Tapeout Core Library
//!
//! Timing-closure and tapeout-readiness engine: violation analysis, ECO fix
//! recommendation, the ECO convergence loop, the signoff battery and the
//! weighted readiness checklist. CAD tools are reached only through the
//! injected [`ToolchainAdapter`].

pub mod closure_effort;
pub mod config;
pub mod domain;
pub mod eco_optimizer;
pub mod fakes;
pub mod fix_recommender;
pub mod metrics;
pub mod obs;
pub mod readiness;
pub mod report_parser;
pub mod reporting;
pub mod signoff;
pub mod telemetry;
pub mod toolchain;
pub mod violation_analyzer;

pub use domain::{
    derive_overall_status, CategoryScore, CheckFailure, CheckFailureKind, CheckKind, CheckStatus,
    ChecklistCategory, ChecklistItem, ChecklistStatus, ConfigError, DeliverableStatus, EcoAction,
    EcoFix, EcoIterationResult, EcoResult, FixPriority, FoundryReadiness, GdsCheck, Grade,
    IterationFailure, IterationFailureKind, PathType, ReadinessScore, RepairCommand, Result,
    SignoffCheckResult, SignoffReport, StopReason, TapeoutChecklist, TapeoutError,
    TimingMeasurement, TimingViolation, ToolchainError,
};

pub use closure_effort::{estimate_closure_effort, ClosureEffort, Difficulty};
pub use config::{load_file, ChecklistConfig, EcoConfig, SignoffConfig, TapeoutConfig};
pub use eco_optimizer::{EcoOptimizer, CONVERGENCE_EPSILON_NS};
pub use fix_recommender::recommend_fixes;
pub use readiness::{
    calculate_readiness_score, check_foundry_readiness, grade_for, ReadinessScorer,
    CHECKLIST_TEMPLATES, GDS_EXTENSIONS, NETLIST_EXTENSIONS, READY_THRESHOLD,
};
pub use report_parser::ParseOutcome;
pub use reporting::{
    read_artifact, render_checklist_markdown, render_eco_markdown, render_eco_script,
    render_signoff_markdown, write_artifact, write_markdown,
};
pub use signoff::{evaluate_check, SignoffOrchestrator};
pub use toolchain::{
    CheckLimits, CheckOutcome, DesignSnapshot, RepairOptions, RepairOutcome, ToolchainAdapter,
    REPAIR_FAILURE_SENTINEL_NS,
};
pub use violation_analyzer::{analyze, analyze_timing, TimingAnalysis};

pub use metrics::METRICS;
pub use obs::RunSpan;
pub use telemetry::{init_tracing, level_for};

/// Tapeout core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
