//! Error types for adhesive

use arrow::error::ArrowError;
use thiserror::Error;

use crate::diagnostic::{render_diagnostics, Diagnostic};

/// Main error type for adhesive operations
#[derive(Debug, Error)]
pub enum AdhesiveError {
    /// Source text produced at least one error-severity diagnostic.
    ///
    /// Nothing was registered; the caller may retry with corrected source.
    #[error("Compilation failed: {}", render_diagnostics(.diagnostics))]
    CompilationFailed { diagnostics: Vec<Diagnostic> },

    /// Neither the artifact store nor the parent resolver knows the name
    #[error("Type not found: {name}")]
    TypeNotFound { name: String },

    /// A unit, or the value it returned, does not satisfy the entry point's contract
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// The unit's own computation failed for a row
    #[error("Computation failed in `{unit}`: {message}")]
    ComputationFailure { unit: String, message: String },

    /// Input columns do not match what the unit reads
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Stored artifact bytes could not be decoded or verified
    #[error("Invalid artifact `{name}`: {reason}")]
    InvalidArtifact { name: String, reason: String },

    /// Error raised by the Arrow C Data Interface or array construction
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error in configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not occur in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdhesiveError {
    /// Shorthand for a failure raised by unit code.
    pub fn computation(unit: impl Into<String>, message: impl Into<String>) -> Self {
        AdhesiveError::ComputationFailure {
            unit: unit.into(),
            message: message.into(),
        }
    }

    pub fn type_not_found(name: impl Into<String>) -> Self {
        AdhesiveError::TypeNotFound { name: name.into() }
    }

    pub fn invalid_artifact(name: impl Into<String>, reason: impl Into<String>) -> Self {
        AdhesiveError::InvalidArtifact {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Diagnostics carried by a failed compilation, empty for every other kind.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            AdhesiveError::CompilationFailed { diagnostics } => diagnostics,
            _ => &[],
        }
    }
}

/// Result type alias for adhesive operations
pub type Result<T> = std::result::Result<T, AdhesiveError>;
