//! Unified error handling for the RGD engine
//!
//! Every fallible operation in `rgd_core` returns [`RgdResult`]. The variants
//! map one-to-one onto the failure kinds a user can act on: a malformed file,
//! an input format the engine refuses to parse, an archive without a single
//! usable payload, a dangling or forward reference, a profile cycle, or a
//! bridge whose prerequisite modules are absent.

use crate::diagnostics::Diagnostics;
use thiserror::Error;

/// Main error type for RGD operations
#[derive(Debug, Error)]
pub enum RgdError {
    /// I/O related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input file. Line and column are 1-based when known.
    #[error("Parse error in {source_name}{}: {message}", location(.line, .column))]
    StructuralParse {
        source_name: String,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },

    /// Input recognised but not parseable by the text engine
    #[error("Unsupported format '{format}': {guidance}")]
    UnsupportedFormat { format: String, guidance: String },

    /// Archive holds zero or several candidate payloads
    #[error("Archive '{archive}' must contain exactly one text payload, found {}", describe_candidates(.candidates))]
    ArchiveResolution {
        archive: String,
        candidates: Vec<String>,
    },

    /// Dangling, forward or duplicate reference
    #[error("Reference error in '{module}' field '{field}' -> '{target}': {reason}")]
    Reference {
        module: String,
        field: String,
        target: String,
        reason: String,
    },

    /// Profile inheritance cycle; the first element is repeated at the end
    #[error("Profile cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    /// A bridge could not find the modules it needs
    #[error("Bridge '{bridge}' is missing prerequisite module '{module}'")]
    MissingPrerequisite { bridge: String, module: String },

    /// Collected validation errors from a Domain Graph Loader run
    #[error("Validation failed with {} error(s)", .0.error_count())]
    Validation(Diagnostics),

    /// Configuration parsing or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/Deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Resource not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid input/argument errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

fn location(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(l), Some(c)) => format!(" at line {}, column {}", l, c),
        (Some(l), None) => format!(" at line {}", l),
        _ => String::new(),
    }
}

fn describe_candidates(candidates: &[String]) -> String {
    if candidates.is_empty() {
        "none".to_string()
    } else {
        format!("{} ({})", candidates.len(), candidates.join(", "))
    }
}

/// Convenience type alias for Results using RgdError
pub type RgdResult<T> = std::result::Result<T, RgdError>;

// ============================================
// From implementations for common error types
// ============================================

impl From<serde_json::Error> for RgdError {
    fn from(err: serde_json::Error) -> Self {
        RgdError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for RgdError {
    fn from(err: serde_yaml::Error) -> Self {
        RgdError::Config(format!("YAML error: {}", err))
    }
}

// Helper methods
impl RgdError {
    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        RgdError::InvalidInput(msg.into())
    }

    /// Create a structural parse error from a `serde_json` failure
    pub fn from_json<S: Into<String>>(source_name: S, err: &serde_json::Error) -> Self {
        RgdError::StructuralParse {
            source_name: source_name.into(),
            line: Some(err.line()).filter(|l| *l > 0),
            column: Some(err.column()).filter(|c| *c > 0),
            message: err.to_string(),
        }
    }

    /// Create a reference error
    pub fn reference(
        module: impl Into<String>,
        field: impl Into<String>,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        RgdError::Reference {
            module: module.into(),
            field: field.into(),
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing-prerequisite error
    pub fn missing_prerequisite(bridge: impl Into<String>, module: impl Into<String>) -> Self {
        RgdError::MissingPrerequisite {
            bridge: bridge.into(),
            module: module.into(),
        }
    }

    /// The collected diagnostics, if this is a validation failure
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            RgdError::Validation(d) => Some(d),
            _ => None,
        }
    }
}
