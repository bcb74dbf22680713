//! Domain error types
//!
//! This module defines the error hierarchy for batchport.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main batchport error type
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
pub enum BatchportError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Entity source (database) errors
    #[error("Source error: {0}")]
    Source(String),

    /// Export pipeline errors
    #[error("Export error: {0}")]
    Export(String),

    /// Errors raised by an output provider
    #[error("Provider error: {0}")]
    Provider(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Memory or storage exhausted while exporting
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Another run of the same profile is active
    #[error("Export profile '{profile_id}' is already running")]
    LockContention { profile_id: String },

    /// The caller cancelled the run
    #[error("Export run was cancelled")]
    Cancelled,

    /// Deployment errors
    #[error("Deployment error: {0}")]
    Deployment(String),

    /// Completion notification errors
    #[error("Notification error: {0}")]
    Notification(String),

    /// Run state persistence errors
    #[error("State management error: {0}")]
    State(String),

    /// Missing profile, store or provider
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl BatchportError {
    /// Whether the error signals memory or disk exhaustion
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, BatchportError::ResourceExhausted(_))
    }
}

/// Details of a single record that could not be exported
#[derive(Debug, Clone)]
pub struct RecordFailure {
    /// Source entity identifier, when known
    pub entity_id: Option<i64>,

    /// Error message
    pub message: String,
}

impl RecordFailure {
    /// Creates a new record failure
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            entity_id: None,
            message: message.into(),
        }
    }

    /// Sets the entity ID
    pub fn with_entity_id(mut self, entity_id: i64) -> Self {
        self.entity_id = Some(entity_id);
        self
    }
}

impl From<std::io::Error> for BatchportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::OutOfMemory | std::io::ErrorKind::StorageFull => {
                BatchportError::ResourceExhausted(err.to_string())
            }
            _ => BatchportError::Io(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for BatchportError {
    fn from(err: serde_json::Error) -> Self {
        BatchportError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BatchportError {
    fn from(err: toml::de::Error) -> Self {
        BatchportError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<csv::Error> for BatchportError {
    fn from(err: csv::Error) -> Self {
        BatchportError::Serialization(format!("CSV error: {err}"))
    }
}

impl From<zip::result::ZipError> for BatchportError {
    fn from(err: zip::result::ZipError) -> Self {
        BatchportError::Io(format!("Zip archive error: {err}"))
    }
}

impl From<reqwest::Error> for BatchportError {
    fn from(err: reqwest::Error) -> Self {
        BatchportError::Deployment(err.to_string())
    }
}

impl From<tokio_postgres::Error> for BatchportError {
    fn from(err: tokio_postgres::Error) -> Self {
        BatchportError::Source(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BatchportError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_lock_contention_display() {
        let err = BatchportError::LockContention {
            profile_id: "products".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Export profile 'products' is already running"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: BatchportError = io_err.into();
        assert!(matches!(err, BatchportError::Io(_)));
        assert!(!err.is_resource_exhaustion());
    }

    #[test]
    fn test_out_of_memory_maps_to_resource_exhausted() {
        let io_err = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "oom");
        let err: BatchportError = io_err.into();
        assert!(err.is_resource_exhaustion());
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: BatchportError = json_err.into();
        assert!(matches!(err, BatchportError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: BatchportError = toml_err.into();
        assert!(matches!(err, BatchportError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_record_failure_builder() {
        let failure = RecordFailure::new("bad price").with_entity_id(42);
        assert_eq!(failure.entity_id, Some(42));
        assert_eq!(failure.message, "bad price");
    }
}
