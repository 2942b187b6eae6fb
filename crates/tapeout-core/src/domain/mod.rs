//! Domain models for the tapeout engine.
//!
//! Canonical definitions for the core entities:
//! - `TimingViolation`: a failing setup/hold path
//! - `EcoFix` / `EcoResult`: repair recommendations and optimizer outcomes
//! - `SignoffReport`: aggregate of the signoff check battery
//! - `ReadinessScore` / `TapeoutChecklist`: weighted tapeout gate

pub mod eco;
pub mod error;
pub mod readiness;
pub mod signoff;
pub mod timing;

pub use eco::{
    EcoAction, EcoFix, EcoIterationResult, EcoResult, FixPriority, IterationFailure,
    IterationFailureKind, RepairCommand, StopReason,
};
pub use error::{ConfigError, Result, TapeoutError, ToolchainError};
pub use readiness::{
    CategoryScore, ChecklistCategory, ChecklistItem, ChecklistStatus, DeliverableStatus,
    FoundryReadiness, GdsCheck, Grade, ReadinessScore, TapeoutChecklist,
};
pub use signoff::{
    derive_overall_status, CheckFailure, CheckFailureKind, CheckKind, CheckStatus,
    SignoffCheckResult, SignoffReport,
};
pub use timing::{PathType, TimingMeasurement, TimingViolation};
