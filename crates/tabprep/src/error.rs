//! Custom error types for the typed-column preparation engine.
//!
//! This module provides a single error hierarchy using `thiserror`.
//! Every fatal condition raised while normalizing input, resolving columns,
//! reassembling transformer output or translating configuration maps to one
//! variant here.
//!
//! Errors are serializable so that they can be reported as structured JSON
//! (`{"code": ..., "message": ...}`) by the CLI or any other front end.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the preparation engine.
#[derive(Error, Debug)]
pub enum PrepError {
    /// Raw input has the wrong rank or sample count.
    #[error("Invalid input shape: {0}")]
    InvalidInputShape(String),

    /// Raw input has the wrong kind (e.g. arrays mixed with a table).
    #[error("Invalid input type: {0}")]
    InvalidInputType(String),

    /// Column was not found in the table.
    #[error("Column '{0}' not found in table")]
    ColumnNotFound(String),

    /// A column selector resolved to no column at all.
    #[error("No valid column to transform: '{selector}' selects nothing from columns {columns:?}")]
    EmptySelection {
        selector: String,
        columns: Vec<String>,
    },

    /// Returned-features policy is unknown or not supported by the transformer.
    #[error("Unsupported returned features policy: {0}")]
    UnsupportedPolicy(String),

    /// `unknown_same_type` was requested for columns that do not share one type.
    #[error("Returned features of the same type require a single column type: {0}")]
    HeterogeneousTypePolicy(String),

    /// Hyperparameter name does not start with a known scope.
    #[error(
        "Each hyperparameter has to start with \"features__\", \"confounds__\", \"target__\" \
         or \"{model_name}__\" but was '{name}'"
    )]
    HyperparameterScope { name: String, model_name: String },

    /// Cross-validation string does not follow the `repeat:<int>_nfolds:<int>` grammar.
    #[error("Invalid CV specification '{0}': expected an int, a splitter or 'repeat:<int>_nfolds:<int>'")]
    CvGrammar(String),

    /// Target values do not fit the configured problem type.
    #[error("Inconsistent problem type: {0}")]
    InconsistentProblemType(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A wrapped transformer reported a failure.
    #[error("Transformer '{name}' failed: {reason}")]
    Transformer { name: String, reason: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PrepError>,
    },
}

impl PrepError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PrepError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for a failure reported by an external transformer.
    pub fn transformer(name: impl Into<String>, reason: impl Into<String>) -> Self {
        PrepError::Transformer {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Get a stable error code for structured reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInputShape(_) => "INVALID_INPUT_SHAPE",
            Self::InvalidInputType(_) => "INVALID_INPUT_TYPE",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::EmptySelection { .. } => "EMPTY_SELECTION",
            Self::UnsupportedPolicy(_) => "UNSUPPORTED_POLICY",
            Self::HeterogeneousTypePolicy(_) => "HETEROGENEOUS_TYPE_POLICY",
            Self::HyperparameterScope { .. } => "HYPERPARAMETER_SCOPE",
            Self::CvGrammar(_) => "CV_GRAMMAR",
            Self::InconsistentProblemType(_) => "INCONSISTENT_PROBLEM_TYPE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Transformer { .. } => "TRANSFORMER_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error can only surface once columns are resolved at fit time.
    pub fn is_fit_time(&self) -> bool {
        match self {
            Self::UnsupportedPolicy(_) | Self::HeterogeneousTypePolicy(_) => true,
            Self::WithContext { source, .. } => source.is_fit_time(),
            _ => false,
        }
    }
}

impl From<crate::config::ConfigValidationError> for PrepError {
    fn from(err: crate::config::ConfigValidationError) -> Self {
        PrepError::InvalidConfig(err.to_string())
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PrepError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PrepError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for preparation operations.
pub type Result<T> = std::result::Result<T, PrepError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PrepError::Polars(e).with_context(context))
    }
}
