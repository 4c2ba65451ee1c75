//! Error types for the fuzzing engine

use thiserror::Error;

/// Main error type for engine operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttackError {
    #[error("Invalid request template: {reason}")]
    InvalidTemplate { reason: String },

    #[error("No values provided for token: {token}")]
    MissingValues { token: String },

    #[error("Token '{token}' must have at least one value")]
    EmptyValueList { token: String },

    #[error("Unknown token: {token}")]
    UnknownToken { token: String },

    #[error("All value lists must have the same length for {mode}: '{token}' has {actual}, expected {expected}")]
    LengthMismatch {
        mode: String,
        token: String,
        expected: usize,
        actual: usize,
    },

    #[error("Attack configuration invalid: {reason}")]
    InvalidAttackConfig { reason: String },

    #[error("Value generation failed: {reason}")]
    ValueGenerationFailed { reason: String },

    #[error("No Host header")]
    MissingHost,

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Network error: {details}")]
    NetworkError { details: String },

    #[error("Timeout occurred: {operation} after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    #[error("Failed after retries: {last_error}")]
    RetriesExhausted { last_error: String },

    #[error("Sink error: {operation} - {reason}")]
    SinkError { operation: String, reason: String },

    #[error("Configuration error: {component} - {reason}")]
    ConfigurationError { component: String, reason: String },
}

impl AttackError {
    /// Create a template error
    pub fn template(reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: &str, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.to_string(),
            duration_ms,
        }
    }

    /// Create a sink error
    pub fn sink(operation: &str, reason: impl std::fmt::Display) -> Self {
        Self::SinkError {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a configuration error
    pub fn configuration(component: &str, reason: &str) -> Self {
        Self::ConfigurationError {
            component: component.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Check if the error is recoverable (the send can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Transport failures
            AttackError::NetworkError { .. } => true,
            AttackError::Timeout { .. } => true,

            // Retrying would fail the same way
            AttackError::InvalidTemplate { .. } => false,
            AttackError::MissingValues { .. } => false,
            AttackError::EmptyValueList { .. } => false,
            AttackError::UnknownToken { .. } => false,
            AttackError::LengthMismatch { .. } => false,
            AttackError::InvalidAttackConfig { .. } => false,
            AttackError::ValueGenerationFailed { .. } => false,
            AttackError::MissingHost => false,
            AttackError::InvalidRequest { .. } => false,
            AttackError::RetriesExhausted { .. } => false,
            AttackError::SinkError { .. } => false,
            AttackError::ConfigurationError { .. } => false,
        }
    }

    /// Errors that abort a run before anything is dispatched
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            AttackError::InvalidTemplate { .. }
                | AttackError::MissingValues { .. }
                | AttackError::EmptyValueList { .. }
                | AttackError::UnknownToken { .. }
                | AttackError::LengthMismatch { .. }
                | AttackError::InvalidAttackConfig { .. }
                | AttackError::ValueGenerationFailed { .. }
                | AttackError::ConfigurationError { .. }
        )
    }
}

impl From<reqwest::Error> for AttackError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            AttackError::InvalidRequest {
                reason: err.to_string(),
            }
        } else if err.is_timeout() {
            AttackError::Timeout {
                operation: "send".to_string(),
                duration_ms: 0,
            }
        } else {
            AttackError::NetworkError {
                details: err.to_string(),
            }
        }
    }
}

impl From<std::io::Error> for AttackError {
    fn from(err: std::io::Error) -> Self {
        AttackError::sink("io", err)
    }
}

/// Result type alias for engine operations
pub type AttackResult<T> = Result<T, AttackError>;
