//! Error types for the CBRI client.
//!
//! Each stage of an upload has its own error enum so callers can tell a bad
//! configuration from a rejected login or a refused measurement. All of them
//! are built with `thiserror`.

use thiserror::Error;

/// Errors raised while validating an [`UploadConfig`](crate::config::UploadConfig)
/// or parsing one of its inputs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed validation.
    #[error("Invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },

    /// The requested analysis language is not one the tool supports.
    #[error("Language must be one of: {supported}")]
    UnsupportedLanguage { supported: String },

    /// The HTTP client could not be constructed.
    #[error("Failed to create HTTP client: {message}")]
    HttpClient { message: String },
}

/// Errors raised while building a [`MetricsRecord`](crate::metrics::MetricsRecord).
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    /// A required field was never set.
    #[error("Missing metrics field: {field}")]
    MissingField { field: &'static str },

    /// A numeric field is negative, not finite, or a percentage outside [0, 100].
    #[error("Metrics field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    /// The capture time cannot be written as a four-digit year.
    #[error("Capture year {year} outside 0..=9999")]
    DateOutOfRange { year: i32 },
}

/// Errors raised while obtaining a session token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The login endpoint answered with a non-success status.
    #[error("Login rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The login response was JSON but carried no `token` field.
    #[error("Login response did not contain a token")]
    MissingToken,

    /// The response body could not be decoded.
    #[error("Malformed login response: {message}")]
    Malformed { message: String },

    /// The request never produced a response.
    #[error("Network error: {message}")]
    Network { message: String },
}

/// Errors raised by [`UploadClient::post_action`](crate::upload::UploadClient::post_action).
#[derive(Debug, Error)]
pub enum UploadError {
    /// No valid token could be obtained; the measurement was not posted.
    #[error("Failed to log into CBRI")]
    AuthFailed(#[source] AuthError),

    /// The dashboard refused the measurement with a 4xx status.
    #[error("Bad request ({status}): {body}")]
    BadRequest { status: u16, body: String },

    /// Anything else between serializing the body and reading a 2xx.
    #[error("Transport error: {message}")]
    Transport { message: String },
}

impl UploadError {
    /// Returns true if the server rejected the request itself.
    pub fn is_client_error(&self) -> bool {
        matches!(self, UploadError::BadRequest { .. })
    }

    /// The response body returned with a rejected request.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            UploadError::BadRequest { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Errors raised by a [`MetricsProducer`](crate::analysis::MetricsProducer).
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The analysis report was not found where the tool writes it.
    #[error("Metrics report not found: {path}")]
    ReportMissing { path: String },

    /// The report exists but could not be read or decoded.
    #[error("Unreadable metrics report {path}: {message}")]
    Report { path: String, message: String },

    /// The report decoded but describes an invalid record.
    #[error("Invalid metrics in report: {0}")]
    Record(#[from] RecordError),
}

/// Result type for configuration validation.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type for session operations.
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Result type for uploads.
pub type UploadResult<T> = std::result::Result<T, UploadError>;

/// Result type for analysis producers.
pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
