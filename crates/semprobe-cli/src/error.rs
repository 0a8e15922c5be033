//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Scenario run did not reach a confirmed submission
    #[error("Scenario failed: {message}")]
    ScenarioFailed {
        /// Error message
        message: String,
    },

    /// One or more applications were rejected by validation
    #[error("{rejected} of {total} applications rejected")]
    ValidationFailed {
        /// Rejected count
        rejected: usize,
        /// Checked count
        total: usize,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Semprobe library error
    #[error("Semprobe error: {0}")]
    Semprobe(#[from] semprobe::SemprobeError),

    /// JSON rendering error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Logging could not be installed
    #[error("Logging setup failed: {message}")]
    Logging {
        /// Error message
        message: String,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a scenario failure
    #[must_use]
    pub fn scenario_failed(message: impl Into<String>) -> Self {
        Self::ScenarioFailed {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a logging setup error
    #[must_use]
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            CliError::invalid_argument("unknown scenario 'x'").to_string(),
            "Invalid argument: unknown scenario 'x'"
        );
        assert_eq!(
            CliError::ValidationFailed {
                rejected: 2,
                total: 15
            }
            .to_string(),
            "2 of 15 applications rejected"
        );
    }

    #[test]
    fn test_library_error_converts() {
        let err: CliError = semprobe::SemprobeError::Timeout { ms: 100 }.into();
        assert!(matches!(err, CliError::Semprobe(_)));
        assert!(err.to_string().contains("100ms"));
    }
}
