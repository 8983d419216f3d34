//! Error handling for amenity merge operations.
//!
//! Provides error types with context for spreadsheet loading, table
//! combination, configuration and export failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AmenityError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Spreadsheet error in file: {path} - {source}")]
    Spreadsheet {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("Source directory not found at path: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Unsupported file format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Workbook has no worksheets: {path}")]
    EmptyWorkbook { path: PathBuf },

    #[error("No tables were loaded from {path} ({failed} files failed)")]
    NoTables { path: PathBuf, failed: usize },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Export failed for file: {path} - {reason}")]
    ExportFailed { path: PathBuf, reason: String },
}

impl AmenityError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an export error for the given output file
    pub fn export_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ExportFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AmenityError>;
