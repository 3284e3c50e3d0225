//! Error types for vigil

use thiserror::Error;

/// Errors that can occur while configuring or running the detector
#[derive(Debug, Error)]
pub enum VigilError {
    /// Malformed input record (missing text, empty id)
    #[error("Invalid record '{record_id}': {reason}")]
    Input { record_id: String, reason: String },

    /// Missing or invalid configuration (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configured regex failed to compile
    #[error("Invalid pattern '{name}': {reason}")]
    Pattern { name: String, reason: String },

    /// Name-recognition oracle failure
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HCL parse failure
    #[error("HCL error: {0}")]
    Hcl(#[from] hcl::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VigilError {
    pub(crate) fn input(record_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Input {
            record_id: record_id.into(),
            reason: reason.into(),
        }
    }
}

/// Failures of the external name-recognition oracle.
///
/// Kept distinct from an empty entity list so the resolver can tell
/// "no names" apart from "could not ask".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    /// Oracle disabled or never loaded
    #[error("Name oracle unavailable: {0}")]
    Unavailable(String),

    /// The call itself failed
    #[error("Name oracle call failed: {0}")]
    Failed(String),

    /// The call exceeded its time budget
    #[error("Name oracle timed out after {0} ms")]
    Timeout(u64),

    /// The oracle answered with something that could not be parsed
    #[error("Invalid oracle response: {0}")]
    InvalidResponse(String),
}

/// Result type alias for vigil operations
pub type Result<T> = std::result::Result<T, VigilError>;
