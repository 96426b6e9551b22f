//! Error types for the ontology core.

use thiserror::Error;

/// Main error type for ontology operations.
#[derive(Error, Debug)]
pub enum OntologyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Export error: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Store-related errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors attached to a single candidate or import record.
///
/// These never abort a batch. The record is skipped and the error is
/// reported as a string in the import or load report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Missing required field, unknown entity or relationship type, malformed record.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A child entity or relationship points at an entity that does not exist.
    #[error("Reference error: {0}")]
    Reference(String),

    /// A confidence value outside [0.0, 1.0].
    #[error("Range error: {0}")]
    Range(String),
}

impl RecordError {
    pub fn schema(msg: impl Into<String>) -> Self {
        RecordError::Schema(msg.into())
    }

    pub fn reference(msg: impl Into<String>) -> Self {
        RecordError::Reference(msg.into())
    }

    pub fn range(msg: impl Into<String>) -> Self {
        RecordError::Range(msg.into())
    }
}

/// Result type alias for ontology operations.
pub type Result<T> = std::result::Result<T, OntologyError>;
