//! Result and error types for Semprobe.
//!
//! Only structural failures are errors. Expected absence of an element,
//! widget, or indicator is reported through `bool`/`Option` return values by
//! the interaction layer and never reaches this type.

use thiserror::Error;

/// Result type for Semprobe operations
pub type SemprobeResult<T> = Result<T, SemprobeError>;

/// Errors that can occur in Semprobe
#[derive(Debug, Error)]
pub enum SemprobeError {
    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunchError {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    NavigationError {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// No element matched the selector
    #[error("Element not found: {selector}")]
    ElementNotFound {
        /// Selector that matched nothing
        selector: String,
    },

    /// An element was found but the action could not be performed
    #[error("Action '{action}' failed on {selector}: {message}")]
    ActionFailed {
        /// Action name
        action: String,
        /// Target selector
        selector: String,
        /// Error message
        message: String,
    },

    /// In-page script evaluation error
    #[error("Script evaluation failed: {message}")]
    EvaluationError {
        /// Error message
        message: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    ScreenshotError {
        /// Error message
        message: String,
    },

    /// Page claimed ready but failed its structural check
    #[error("Page '{page}' is not ready: {message}")]
    PageNotReady {
        /// Page component name
        page: String,
        /// Error message
        message: String,
    },

    /// Registry component missing or never became ready
    #[error("Component '{name}' not found or not ready within {timeout_ms}ms")]
    ComponentNotReady {
        /// Requested name (canonical or alias)
        name: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// Alias collides with an existing alias or component name
    #[error("Alias '{alias}' conflicts: {message}")]
    AliasConflict {
        /// Alias that was rejected
        alias: String,
        /// Error message
        message: String,
    },

    /// Invalid state error (operation called in wrong state)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl SemprobeError {
    /// Create an action failure for a selector
    #[must_use]
    pub fn action_failed(
        action: impl Into<String>,
        selector: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self::ActionFailed {
            action: action.into(),
            selector: selector.to_string(),
            message: message.into(),
        }
    }

    /// Create an element-not-found error for a selector
    #[must_use]
    pub fn not_found(selector: impl ToString) -> Self {
        Self::ElementNotFound {
            selector: selector.to_string(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error is a timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
