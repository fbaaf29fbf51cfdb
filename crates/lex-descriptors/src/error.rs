//! Custom error types for the featurization pipeline.
//!
//! Fatal conditions (unreadable input, missing identifier column, empty
//! identifiers, unsupported output format) are variants of [`FeaturizeError`].
//! Row-level extraction failures and undefined column statistics are not
//! errors: they are recorded in the run summary and the run continues.
//!
//! Errors are serializable so they can be emitted as JSON by the CLI.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the featurization pipeline.
#[derive(Error, Debug)]
pub enum FeaturizeError {
    /// The input location is not a readable table of the expected format.
    #[error("Input is not a readable CSV table: {0}")]
    Format(String),

    /// The required identifier column is missing from the input table.
    #[error("The input table does not contain a '{0}' column")]
    Schema(String),

    /// One or more identifier cells are null or blank.
    #[error("Column '{column}' has {count} empty entries (first at row {first_row})")]
    Data {
        column: String,
        count: usize,
        first_row: usize,
    },

    /// The requested output format is not supported.
    #[error("Unsupported output type '{0}'. Choose 'csv' or 'parquet'")]
    UnsupportedFormat(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The descriptor source reported an unusable column schema.
    #[error("Descriptor source '{0}' reported an empty column schema")]
    DescriptorSchema(String),

    /// Internal error (e.g., a feature matrix that lost its shape).
    #[error("Internal error: {0}")]
    Internal(String),

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
        source: Box<FeaturizeError>,
    },
}

impl FeaturizeError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        FeaturizeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for machine-readable output.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Format(_) => "FORMAT_ERROR",
            Self::Schema(_) => "SCHEMA_ERROR",
            Self::Data { .. } => "DATA_ERROR",
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::DescriptorSchema(_) => "DESCRIPTOR_SCHEMA_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error was caused by the user's input table or flags
    /// rather than by the environment.
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::Format(_)
            | Self::Schema(_)
            | Self::Data { .. }
            | Self::UnsupportedFormat(_)
            | Self::InvalidConfig(_) => true,
            Self::WithContext { source, .. } => source.is_input_error(),
            _ => false,
        }
    }
}

impl From<crate::config::ConfigValidationError> for FeaturizeError {
    fn from(err: crate::config::ConfigValidationError) -> Self {
        FeaturizeError::InvalidConfig(err.to_string())
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for FeaturizeError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("FeaturizeError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for featurization operations.
pub type Result<T> = std::result::Result<T, FeaturizeError>;

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
        self.map_err(|e| FeaturizeError::Polars(e).with_context(context))
    }
}
