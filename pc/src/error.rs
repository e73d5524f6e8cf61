//! API error types

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Backend workflow step an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Extraction,
    ComplianceCheck,
    Merge,
    ActionPlan,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extraction => write!(f, "Extraction"),
            Self::ComplianceCheck => write!(f, "Compliance check"),
            Self::Merge => write!(f, "Merge"),
            Self::ActionPlan => write!(f, "Action plan"),
        }
    }
}

/// Errors that can occur while talking to the PerryOps backend
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing file: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Upload failed with status {status}: {detail}")]
    UploadFailed { status: u16, detail: String },

    #[error("{operation} failed with status {status}: {detail}")]
    StepFailed {
        operation: Operation,
        status: u16,
        detail: String,
    },

    #[error("{message}")]
    Request { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// Map a reqwest failure, separating client-side timeouts from other transport errors
    pub(crate) fn transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Network(err)
        }
    }

    /// HTTP status code carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UploadFailed { status, .. } | Self::StepFailed { status, .. } | Self::Request { status, .. } => {
                Some(*status)
            }
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::UploadFailed { status, .. } | Self::StepFailed { status, .. } | Self::Request { status, .. } => {
                is_retryable_status(*status)
            }
            Self::MissingFile(_) | Self::InvalidUrl(_) | Self::Io(_) | Self::Json(_) => false,
        }
    }
}

/// Check if an HTTP status code is retryable
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Pull the human-readable message out of a FastAPI-style error body
///
/// Handles `{"detail": [{"msg": ...}, ...]}` (validation errors, first entry wins)
/// and `{"detail": "..."}` (raised HTTP exceptions). Returns `None` for anything else.
pub fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(entries) => entries
            .first()
            .and_then(|e| e.get("msg"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Detail text for a failed step: the structured detail if present, else the raw body
pub(crate) fn detail_or_body(body: &str) -> String {
    error_detail(body).unwrap_or_else(|| body.trim().to_string())
}
