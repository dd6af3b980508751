//! Error types for the trip-cleaning pipeline.
//!
//! Fatal conditions (schema violations, referential ambiguity) abort the
//! whole run; data-quality anomalies are never errors and are handled by the
//! filter/repair stages instead.

use serde::ser::SerializeStruct;
use serde::Serialize;
use thiserror::Error;

/// The main error type for a cleaning run.
#[derive(Error, Debug)]
pub enum CleaningError {
    /// A required column is missing or has an unexpected type.
    #[error("Schema violation on column '{column}': expected {expected}, found {found}")]
    SchemaViolation {
        column: String,
        expected: String,
        found: String,
    },

    /// The trip batch contains a repeated ride id.
    #[error("Duplicate ride_id '{0}' in batch")]
    DuplicateRideId(String),

    /// The station reference maps one name to conflicting coordinates.
    #[error("Station '{station}' appears in the reference with conflicting coordinates ({first_lat}, {first_lng}) vs ({second_lat}, {second_lng})")]
    ReferentialAmbiguity {
        station: String,
        first_lat: f64,
        first_lng: f64,
        second_lat: f64,
        second_lng: f64,
    },

    /// A categorical column holds a value outside its known label set.
    #[error("Unknown value '{value}' in categorical column '{column}'")]
    UnknownCategory { column: String, value: String },

    /// Column was not found in the batch.
    #[error("Column '{0}' not found in batch")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

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
        source: Box<CleaningError>,
    },
}

impl CleaningError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        CleaningError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable code identifying the error class.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SchemaViolation { .. } => "SCHEMA_VIOLATION",
            Self::DuplicateRideId(_) => "DUPLICATE_RIDE_ID",
            Self::ReferentialAmbiguity { .. } => "REFERENTIAL_AMBIGUITY",
            Self::UnknownCategory { .. } => "UNKNOWN_CATEGORY",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the error stems from the input batch rather than the
    /// environment (IO, serialization).
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::SchemaViolation { .. }
                | Self::DuplicateRideId(_)
                | Self::ReferentialAmbiguity { .. }
                | Self::UnknownCategory { .. }
        )
    }
}

impl From<crate::config::ConfigValidationError> for CleaningError {
    fn from(e: crate::config::ConfigValidationError) -> Self {
        CleaningError::InvalidConfig(e.to_string())
    }
}

/// Errors serialize as `{code, message}` for report embedding.
impl Serialize for CleaningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("CleaningError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for cleaning operations.
pub type Result<T> = std::result::Result<T, CleaningError>;

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
        self.map_err(|e| CleaningError::Polars(e).with_context(context))
    }
}
