//! Error types with suggestions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for step failures and validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    LinkUnavailable,
    InvalidInput,
    TemplateNotFound,
    NotCentered,
    ActuatorFailed,
    Cancelled,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::LinkUnavailable => write!(f, "LINK_UNAVAILABLE"),
            ErrorCode::InvalidInput => write!(f, "INVALID_INPUT"),
            ErrorCode::TemplateNotFound => write!(f, "TEMPLATE_NOT_FOUND"),
            ErrorCode::NotCentered => write!(f, "NOT_CENTERED"),
            ErrorCode::ActuatorFailed => write!(f, "ACTUATOR_FAILED"),
            ErrorCode::Cancelled => write!(f, "CANCELLED"),
            ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

/// An error with a hint on how to recover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub suggestion: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (hint: {})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// The serial port could not be opened or configured.
    pub fn link_unavailable(port: &str, error: &str) -> Self {
        Self {
            code: ErrorCode::LinkUnavailable,
            message: format!("Failed to open actuator link '{}': {}", port, error),
            suggestion: Some(
                "Check the device is plugged in, the port name is right (--port), and your user can access it (e.g. the dialout group)"
                    .into(),
            ),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidInput,
            message: message.into(),
            suggestion: Some("Check the command syntax and try again".into()),
        }
    }

    /// Create an invalid input error with a custom suggestion.
    pub fn invalid_input_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            code: ErrorCode::InvalidInput,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    pub fn template_not_found(template: &str, attempts: u32) -> Self {
        Self {
            code: ErrorCode::TemplateNotFound,
            message: format!(
                "Template '{}' not found on screen after {} attempts",
                template, attempts
            ),
            suggestion: Some(
                "Make sure the target is visible, or lower locate.confidence in the config".into(),
            ),
        }
    }

    /// The controller gave up before the cursor reached the target.
    pub fn not_centered(template: &str, reason: &str) -> Self {
        Self {
            code: ErrorCode::NotCentered,
            message: format!("Cursor did not reach '{}': {}", template, reason),
            suggestion: Some(
                "Check that the cursor sensor and the matcher report the same screen coordinates, or raise controller.max_center_time"
                    .into(),
            ),
        }
    }

    pub fn actuator_failed(command: &str) -> Self {
        Self {
            code: ErrorCode::ActuatorFailed,
            message: format!("Actuator did not acknowledge '{}'", command),
            suggestion: Some(
                "The device may have reset or stopped responding. Reconnect it and run again."
                    .into(),
            ),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            code: ErrorCode::Cancelled,
            message: "Run cancelled by user".to_string(),
            suggestion: Some("Start the run again when ready".into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InternalError,
            message: message.into(),
            suggestion: Some("This is an internal error. Please report it if it persists.".into()),
        }
    }
}
