//! Error types for DSML directory operations.
//!
//! Every failure a directory operation can produce is folded into the single [`Error`] enum
//! below: malformed filters, unsupported features, transport failures, malformed server
//! responses, DSML error envelopes and non-zero LDAP result codes.

use serde::Serialize;
use thiserror::Error;

use crate::result_code::ResultCode;

/// Main error type for directory operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The LDAP filter string could not be translated
    #[error("Malformed filter: {0}")]
    MalformedFilter(String),

    /// The requested feature is not supported by the DSML adapter
    #[error("Not supported: {0}")]
    Unsupported(String),

    /// The server could not be reached or the HTTP exchange failed
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The HTTP request timed out
    #[error("Timeout waiting for directory server: {0}")]
    Timeout(String),

    /// The server answered with a document of unexpected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The server returned a DSML `errorResponse` envelope or a SOAP fault
    #[error("DSML error ({kind}){}{}", fmt_opt(.message), fmt_opt(.detail))]
    Dsml {
        /// Error type reported by the server (e.g. `malformedRequest`)
        kind: String,
        /// Human readable message, if any
        message: Option<String>,
        /// Additional detail text, if any
        detail: Option<String>,
    },

    /// The server reported a non-zero LDAP result code
    #[error("Directory error {code} ({}){}", describe(.code, .description), fmt_opt(.message))]
    Directory {
        /// Numeric LDAP result code
        code: u32,
        /// Description attribute sent by the server (`descr`)
        description: Option<String>,
        /// Diagnostic message sent by the server
        message: Option<String>,
    },

    /// The caller supplied invalid input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

fn describe(code: &u32, description: &Option<String>) -> String {
    description.clone().unwrap_or_else(|| {
        ResultCode::from_code(*code)
            .map_or("unknown", ResultCode::name)
            .to_string()
    })
}

fn fmt_opt(value: &Option<String>) -> String {
    value
        .as_deref()
        .map(|text| format!(": {text}"))
        .unwrap_or_default()
}

/// Specialized result type for directory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedFilter(_) => "MALFORMED_FILTER",
            Self::Unsupported(_) => "UNSUPPORTED",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::MalformedResponse(_) => "MALFORMED_RESPONSE",
            Self::Dsml { .. } => "DSML_ERROR",
            Self::Directory { .. } => "DIRECTORY_ERROR",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Returns the LDAP result code for [`Error::Directory`] errors.
    #[must_use]
    pub fn result_code(&self) -> Option<ResultCode> {
        match self {
            Self::Directory { code, .. } => ResultCode::from_code(*code),
            _ => None,
        }
    }

    /// Returns true if the server reported that the addressed entry does not exist.
    #[must_use]
    pub fn is_no_such_object(&self) -> bool {
        self.result_code() == Some(ResultCode::NoSuchObject)
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        let details = match &self {
            Self::Dsml { kind, detail, .. } => Some(serde_json::json!({
                "kind": kind,
                "detail": detail,
            })),
            Self::Directory {
                code, description, ..
            } => Some(serde_json::json!({
                "resultCode": code,
                "description": description,
            })),
            _ => None,
        };

        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                details,
            },
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_) | Self::Transport(_) | Self::MalformedResponse(_)
        )
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::ConfigError(format!("invalid directory url: {err}"))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::MalformedResponse(format!("invalid base64 value: {err}"))
    }
}
