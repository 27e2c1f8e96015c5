//! Error types and handling for Amphora
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Amphora operations
pub type Result<T> = std::result::Result<T, AmphoraError>;

/// Main error type for Amphora
#[derive(Debug, Error)]
pub enum AmphoraError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Sensor/actuator hub errors (failed reads or write commands)
    #[error("Hub error: {message}")]
    Hub { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl AmphoraError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        AmphoraError::Config {
            message: message.into(),
        }
    }

    /// Create a new hub error
    pub fn hub<S: Into<String>>(message: S) -> Self {
        AmphoraError::Hub {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        AmphoraError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        AmphoraError::Io {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        AmphoraError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        AmphoraError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for AmphoraError {
    fn from(err: std::io::Error) -> Self {
        AmphoraError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for AmphoraError {
    fn from(err: serde_yaml::Error) -> Self {
        AmphoraError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AmphoraError {
    fn from(err: serde_json::Error) -> Self {
        AmphoraError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<chrono::ParseError> for AmphoraError {
    fn from(err: chrono::ParseError) -> Self {
        AmphoraError::validation("datetime", &err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = AmphoraError::config("test config error");
        assert!(matches!(err, AmphoraError::Config { .. }));

        let err = AmphoraError::hub("test hub error");
        assert!(matches!(err, AmphoraError::Hub { .. }));

        let err = AmphoraError::validation("field", "test validation error");
        assert!(matches!(err, AmphoraError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = AmphoraError::config("test error");
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Configuration error: test error");

        let err = AmphoraError::validation("test_field", "invalid value");
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Validation error: test_field - invalid value");
    }
}
