//! Error types for the retrieval pipeline.
//!
//! Only three kinds of failure ever reach a caller: a request that was invalid before any
//! network activity, a response that could not be parsed, and a cancelled call. Missing
//! resources and transient upstream failures are reported as "no result" instead.

use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Validation errors for domain values and configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid date '{value}', expected {expected}")]
    InvalidDate {
        value: String,
        expected: &'static str,
    },

    #[error("observation value for {obs_date} at vintage {vintage_date} is not available")]
    MissingValue {
        obs_date: String,
        vintage_date: String,
    },

    #[error("config field '{field}' must be greater than zero")]
    ZeroLimit { field: &'static str },
    #[error("vintage chunk size {size} exceeds the host maximum of {max}")]
    ChunkTooLarge { size: usize, max: usize },
    #[error("base url cannot be empty")]
    EmptyBaseUrl,
}

/// Payload parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid json payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload has no '{root}' element")]
    MissingRoot { root: String },

    #[error("observation row {row} has no '{field}' field")]
    MissingField { row: usize, field: &'static str },

    #[error("observation row {row} column '{column}' has unexpected type")]
    UnexpectedCell { row: usize, column: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Failure classification for errors that cross the pipeline boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceErrorKind {
    /// A precondition failed before any network activity.
    InvalidRequest,
    /// The upstream payload could not be parsed.
    MalformedResponse,
    /// The call was cancelled through the client's cancellation token.
    Cancelled,
}

/// Structured error returned by the fetch pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
        }
    }

    /// Wraps a parse failure with the request it belongs to.
    pub fn malformed_response(uri: &str, root: &str, error: &ParseError) -> Self {
        Self {
            kind: SourceErrorKind::MalformedResponse,
            message: format!("failed to parse '{root}' from {uri}: {error}"),
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Cancelled,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::MalformedResponse => "source.malformed_response",
            SourceErrorKind::Cancelled => "source.cancelled",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl From<ValidationError> for SourceError {
    fn from(error: ValidationError) -> Self {
        Self::invalid_request(error.to_string())
    }
}
