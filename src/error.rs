// src/error.rs
//! Application error types with structured error handling.
//!
//! Each variant names a failure mode of the export: where it happened and
//! whether it is worth retrying. "Not found" is deliberately *not* an error
//! for lookups; repository getters return `Ok(None)` instead.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Classification of an unsuccessful HTTP response from the wiki API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    /// 429, back off and retry
    RateLimited,
    /// 404, the resource does not exist or is not visible to this user
    NotFound,
    /// 401, credentials rejected
    Unauthorized,
    /// 403, credentials valid but lacking permission
    Forbidden,
    /// Any 5xx
    ServerError(u16),
    /// Any other non-success status
    HttpStatus(u16),
}

impl ApiErrorCode {
    pub fn from_http_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            404 => Self::NotFound,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            500..=599 => Self::ServerError(status),
            other => Self::HttpStatus(other),
        }
    }

    /// Whether this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::ServerError(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate_limited"),
            Self::NotFound => write!(f, "not_found"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::ServerError(code) => write!(f, "server_error_{}", code),
            Self::HttpStatus(code) => write!(f, "http_{}", code),
        }
    }
}

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Network failure: {0}")]
    NetworkFailure(#[from] reqwest::Error),

    #[error("Wiki API returned an error ({code}) for {url}: {message}")]
    ApiService {
        code: ApiErrorCode,
        message: String,
        url: String,
    },

    #[error("Circuit breaker open after repeated failures; retry in {}s", retry_in.as_secs())]
    CircuitOpen { retry_in: Duration },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Filesystem IO error at {path}: {source}")]
    OutputWrite {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("Markup conversion failed: {0}")]
    Conversion(String),

    #[error("Template render error for template {name}: {message}")]
    TemplateRenderError { name: String, message: String },

    #[error("Path error: {0}")]
    PathError(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error(transparent)]
    Validation(#[from] crate::types::ValidationError),
}

impl AppError {
    /// Transient failures: connection problems, timeouts, 429 and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkFailure(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            Self::ApiService { code, .. } => code.is_retryable(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiService { code, .. } if code.is_not_found())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::MalformedResponse(err.to_string())
    }
}

impl From<std::fmt::Error> for AppError {
    fn from(err: std::fmt::Error) -> Self {
        AppError::InternalError {
            message: "Formatting error".to_string(),
            source: Some(Box::new(err)),
        }
    }
}
