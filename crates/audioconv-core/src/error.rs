//! Error taxonomy for the conversion lifecycle.
//!
//! Every failure a request can hit collapses into one [`ErrorCategory`].
//! Categories are stable and user-facing; the message attached to each
//! [`ConvertError`] is already sanitized for clients, except for
//! [`ConvertError::Io`] whose detail stays in the logs.

use serde::Serialize;
use strum::{AsRefStr, Display};
use thiserror::Error;

/// Stable, user-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    UnsupportedFormat,
    PayloadTooLarge,
    InvalidInput,
    Timeout,
    ConversionFailed,
    InternalError,
    NotFound,
    AccessDenied,
}

/// All errors that can occur while ingesting, converting or serving a file.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The requested target format is not in the supported set.
    #[error("Unsupported format: {requested}. Supported: {supported}")]
    UnsupportedFormat { requested: String, supported: String },

    /// The upload exceeded the configured byte limit.
    #[error("File too large: exceeds maximum of {limit_mb}MB")]
    PayloadTooLarge { limit_mb: u64 },

    /// Empty, truncated or corrupt input.
    #[error("{0}")]
    InvalidInput(String),

    /// The converter did not finish within its wall-clock budget.
    #[error("{0}")]
    Timeout(String),

    /// The converter failed for a reason the classifier does not recognise.
    /// Carries only the tail of the diagnostics.
    #[error("{0}")]
    ConversionFailed(String),

    /// The service itself misbehaved (missing output, tool not startable).
    #[error("{0}")]
    Internal(String),

    /// No artifact with the requested name.
    #[error("File not found: {0}")]
    NotFound(String),

    /// The requested path escapes the output root.
    #[error("Access denied")]
    AccessDenied,

    /// Filesystem failure. Detail is logged, never shown to clients.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConvertError::UnsupportedFormat { .. } => ErrorCategory::UnsupportedFormat,
            ConvertError::PayloadTooLarge { .. } => ErrorCategory::PayloadTooLarge,
            ConvertError::InvalidInput(_) => ErrorCategory::InvalidInput,
            ConvertError::Timeout(_) => ErrorCategory::Timeout,
            ConvertError::ConversionFailed(_) => ErrorCategory::ConversionFailed,
            ConvertError::Internal(_) | ConvertError::Io(_) => ErrorCategory::InternalError,
            ConvertError::NotFound(_) => ErrorCategory::NotFound,
            ConvertError::AccessDenied => ErrorCategory::AccessDenied,
        }
    }

    /// Message safe to return to a client.
    pub fn client_message(&self) -> String {
        match self {
            ConvertError::Io(_) => "internal server error".to_owned(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn category_codes_are_snake_case() {
        assert_eq!(ErrorCategory::PayloadTooLarge.as_ref(), "payload_too_large");
        assert_eq!(ErrorCategory::AccessDenied.to_string(), "access_denied");
    }

    #[test]
    fn io_errors_are_internal_and_hidden() {
        let err = ConvertError::from(std::io::Error::other("/secret/path exploded"));
        assert_eq!(err.category(), ErrorCategory::InternalError);
        assert!(!err.client_message().contains("/secret/path"));
    }

    #[test]
    fn payload_limit_is_reported_in_megabytes() {
        let err = ConvertError::PayloadTooLarge { limit_mb: 100 };
        assert_eq!(err.to_string(), "File too large: exceeds maximum of 100MB");
    }
}
