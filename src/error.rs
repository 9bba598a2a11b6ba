//! Error taxonomy for the runner, the grading session and dataset loading.

use thiserror::Error;

use crate::domain::FailureKind;

/// Failure of a single query execution. All variants are recoverable per submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    /// Any compile-time or deterministic query error reported by the engine.
    #[error("syntax error: {0}")]
    SyntaxError(String),
    #[error("forbidden statement: {0}")]
    Forbidden(String),
    #[error("query exceeded its time budget")]
    Timeout,
    #[error("engine fault: {0}")]
    EngineFault(String),
    #[error("query returned more than {limit} rows")]
    TooManyRows { limit: usize },
    #[error("query was cancelled")]
    Cancelled,
}

impl RunnerError {
    /// Only transient engine faults are worth a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RunnerError::EngineFault(_))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            RunnerError::SyntaxError(_) => FailureKind::SyntaxError,
            RunnerError::Forbidden(_) => FailureKind::Forbidden,
            RunnerError::Timeout => FailureKind::Timeout,
            RunnerError::EngineFault(_) => FailureKind::EngineFault,
            RunnerError::TooManyRows { .. } => FailureKind::TooManyRows,
            RunnerError::Cancelled => FailureKind::Cancelled,
        }
    }
}

/// Caller mistakes: rejected before any query runs, surfaced as 400.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GradingError {
    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),
    #[error("invalid reference spec: {0}")]
    InvalidReferenceSpec(String),
    #[error("query is empty")]
    EmptyQuery,
    #[error("query is {size} bytes, limit is {limit}")]
    QueryTooLarge { size: usize, limit: usize },
}

impl GradingError {
    /// Stable machine-readable code for API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            GradingError::UnknownDataset(_) => "unknown_dataset",
            GradingError::InvalidReferenceSpec(_) => "invalid_reference_spec",
            GradingError::EmptyQuery => "empty_query",
            GradingError::QueryTooLarge { .. } => "query_too_large",
        }
    }
}

/// Invalid dataset definition, reported while building the catalog.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset '{dataset}': {message}")]
    Invalid { dataset: String, message: String },
    #[error("failed to read dataset file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse dataset file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
