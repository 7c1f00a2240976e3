//! Error types for the cadence_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cadence_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// User input rejected before it reached the engine
    #[error("Validation error: {0}")]
    Validation(String),

    /// No patient with the given id
    #[error("Patient not found: {0}")]
    PatientNotFound(String),

    /// No session with the given id on the patient
    #[error("Session {session_id} not found for patient {patient_id}")]
    SessionNotFound {
        patient_id: String,
        session_id: String,
    },

    /// Attempted edit of a validated session
    #[error("Session {0} is locked")]
    SessionLocked(String),

    /// Stored document could not be brought to the current schema
    #[error("Migration error: {0}")]
    Migration(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
