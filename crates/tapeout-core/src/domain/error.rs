//! Domain-level error taxonomy for the tapeout engine.

/// Rejected configuration. Always raised before any toolchain call is issued.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} out of range: {value} (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("contradictory options: {0}")]
    Contradictory(String),

    #[error("unknown checklist item id: {0}")]
    UnknownChecklistItem(String),

    #[error("no signoff checks enabled")]
    NoChecksEnabled,
}

/// Failures reported by a toolchain adapter.
///
/// `Timeout` is kept apart from `Invocation` so callers can decide whether a
/// retry with a larger budget makes sense.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolchainError {
    #[error("tool '{tool}' failed: {message}")]
    Invocation { tool: String, message: String },

    #[error("{operation} timed out after {after_secs}s")]
    Timeout { operation: String, after_secs: u64 },

    #[error("toolchain unavailable: {0}")]
    Unavailable(String),
}

impl ToolchainError {
    pub fn invocation(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invocation {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Tapeout engine errors.
#[derive(Debug, thiserror::Error)]
pub enum TapeoutError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("toolchain error: {0}")]
    Toolchain(#[from] ToolchainError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config format error: {0}")]
    ConfigFormat(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for tapeout engine operations.
pub type Result<T> = std::result::Result<T, TapeoutError>;
