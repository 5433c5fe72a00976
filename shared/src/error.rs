use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::FETCH_FAILED_MESSAGE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    PermissionDenied,
    PermissionDeniedForever,
    LocationServiceDisabled,
    Location,
    FetchFailed,
    MalformedResponse,
    InvalidConfig,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::PermissionDenied => "LOCATION_PERMISSION_DENIED",
            Self::PermissionDeniedForever => "LOCATION_PERMISSION_DENIED_FOREVER",
            Self::LocationServiceDisabled => "LOCATION_SERVICE_DISABLED",
            Self::Location => "LOCATION_ERROR",
            Self::FetchFailed => "FETCH_FAILED",
            Self::MalformedResponse => "MALFORMED_RESPONSE",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::PermissionDenied
            | Self::LocationServiceDisabled
            | Self::Location
            | Self::FetchFailed => ErrorSeverity::Transient,

            Self::PermissionDeniedForever | Self::MalformedResponse => ErrorSeverity::Permanent,

            Self::InvalidConfig | Self::Internal => ErrorSeverity::Fatal,
        }
    }

    /// Whether a user-initiated retry (apply / recenter) can succeed without
    /// the user changing anything outside the app.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::PermissionDenied
                | Self::LocationServiceDisabled
                | Self::Location
                | Self::FetchFailed
                | Self::MalformedResponse
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    /// The text shown in the status line. Never includes the raw cause.
    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::PermissionDenied => "Location permissions are denied.".into(),
            ErrorKind::PermissionDeniedForever => {
                "Location permissions are permanently denied. Please enable them in Settings."
                    .into()
            }
            ErrorKind::LocationServiceDisabled => {
                "Location services are disabled. Please turn them on and try again.".into()
            }
            ErrorKind::Location => {
                "Unable to determine your location. Please check your GPS settings.".into()
            }
            ErrorKind::FetchFailed | ErrorKind::MalformedResponse => FETCH_FAILED_MESSAGE.into(),
            ErrorKind::InvalidConfig => self.message.clone(),
            ErrorKind::Internal => {
                "An unexpected error occurred. Please try again.".into()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("Latitude {0} is out of valid range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("Longitude {0} is out of valid range [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("Coordinate value is not finite (NaN or Infinity)")]
    NonFinite,
}

impl From<CoordinateError> for AppError {
    fn from(e: CoordinateError) -> Self {
        AppError::new(ErrorKind::Location, e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("{field} must be a finite, non-negative number (got {value})")]
    InvalidDistance { field: &'static str, value: f64 },
    #[error("default filter {0} is outside [0, 100]")]
    FilterOutOfRange(f64),
    #[error("filter parameter name cannot be empty")]
    EmptyFilterParam,
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::InvalidConfig, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod error_kind_tests {
        use super::*;

        #[test]
        fn test_codes_are_distinct() {
            let kinds = [
                ErrorKind::PermissionDenied,
                ErrorKind::PermissionDeniedForever,
                ErrorKind::LocationServiceDisabled,
                ErrorKind::Location,
                ErrorKind::FetchFailed,
                ErrorKind::MalformedResponse,
                ErrorKind::InvalidConfig,
                ErrorKind::Internal,
            ];
            let codes: std::collections::HashSet<_> = kinds.iter().map(|k| k.code()).collect();
            assert_eq!(codes.len(), kinds.len());
        }

        #[test]
        fn test_denied_forever_is_not_retryable() {
            assert!(ErrorKind::PermissionDenied.is_retryable());
            assert!(!ErrorKind::PermissionDeniedForever.is_retryable());
            assert_eq!(
                ErrorKind::PermissionDeniedForever.default_severity(),
                ErrorSeverity::Permanent
            );
        }
    }

    mod app_error_tests {
        use super::*;

        #[test]
        fn test_fetch_failure_hides_cause() {
            let error = AppError::new(ErrorKind::FetchFailed, "HTTP 404")
                .with_internal("status 404 from https://example.com/search");
            let message = error.user_facing_message();
            assert_eq!(message, FETCH_FAILED_MESSAGE);
            assert!(!message.contains("404"));
            assert!(error.to_string().contains("internal: status 404"));
        }

        #[test]
        fn test_malformed_response_uses_generic_message() {
            let error = AppError::new(ErrorKind::MalformedResponse, "missing field `name`");
            assert_eq!(error.user_facing_message(), FETCH_FAILED_MESSAGE);
        }

        #[test]
        fn test_fatal_severity_disables_retry() {
            let error =
                AppError::new(ErrorKind::FetchFailed, "x").with_severity(ErrorSeverity::Fatal);
            assert!(!error.is_retryable());
        }

        #[test]
        fn test_with_context() {
            let error = AppError::new(ErrorKind::Location, "bad fix").with_context("lat", "91");
            assert_eq!(error.context.get("lat").map(String::as_str), Some("91"));
        }

        #[test]
        fn test_config_error_conversion() {
            let error: AppError = ConfigError::FilterOutOfRange(120.0).into();
            assert_eq!(error.kind, ErrorKind::InvalidConfig);
            assert!(error.user_facing_message().contains("120"));
        }
    }
}
