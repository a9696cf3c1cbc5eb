//! Error types for svo-map
//!
//! Errors are reported per batch item. Only `NoUsableInput` stops a whole
//! batch; lookup failures never surface here at all (they become unresolved
//! cache entries).

use std::path::PathBuf;
use thiserror::Error;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum MapError {
    /// Input file does not exist
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    /// Input file exists but could not be parsed as a table
    #[error("Unreadable input {path}: {message}")]
    UnreadableInput { path: PathBuf, message: String },

    /// Extension not handled by any reader
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(PathBuf),

    /// A required header is absent
    #[error("Missing required column '{column}' in {path}")]
    MissingColumn { path: PathBuf, column: String },

    /// No city given and none found in the file
    #[error("No city context for {0}")]
    NoCityContext(PathBuf),

    /// Address components missing; the row cannot be geocoded
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Map document could not be produced
    #[error("Render error: {0}")]
    Render(String),

    /// Geocode cache could not be persisted
    #[error("Cache error: {0}")]
    Cache(String),

    /// Every input of the batch failed to load
    #[error("No usable input: {0}")]
    NoUsableInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// svo-common error
    #[error("Common error: {0}")]
    Common(#[from] svo_common::Error),
}

impl From<minijinja::Error> for MapError {
    fn from(err: minijinja::Error) -> Self {
        MapError::Render(err.to_string())
    }
}

impl MapError {
    /// Stable code recorded in batch failure reports
    pub fn code(&self) -> &'static str {
        match self {
            MapError::InputNotFound(_) => "INPUT_NOT_FOUND",
            MapError::UnreadableInput { .. } => "UNREADABLE_INPUT",
            MapError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            MapError::MissingColumn { .. } => "MISSING_COLUMN",
            MapError::NoCityContext(_) => "NO_CITY_CONTEXT",
            MapError::InvalidAddress(_) => "INVALID_ADDRESS",
            MapError::Render(_) => "RENDER_ERROR",
            MapError::Cache(_) => "CACHE_ERROR",
            MapError::NoUsableInput(_) => "NO_USABLE_INPUT",
            MapError::Io(_) => "IO_ERROR",
            MapError::Common(_) => "COMMON_ERROR",
        }
    }
}

/// Result type for pipeline operations
pub type MapResult<T> = Result<T, MapError>;
