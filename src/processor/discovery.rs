//! File discovery module for amenity spreadsheets
//!
//! Finds readable spreadsheet files directly inside the source directory
//! and classifies them by format.

use crate::constants::{CSV_EXTENSION, WORKBOOK_EXTENSIONS};
use crate::error::{AmenityError, Result};
use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Spreadsheet formats the loader can read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Excel-family workbook read through calamine
    Workbook,
    /// Delimited text read through polars
    Csv,
}

impl SourceFormat {
    /// Classify a path by its (case-insensitive) extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if ext == CSV_EXTENSION {
            Some(SourceFormat::Csv)
        } else if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) {
            Some(SourceFormat::Workbook)
        } else {
            None
        }
    }
}

/// A spreadsheet found in the source directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub file_name: String,
    pub format: SourceFormat,
}

/// File discovery component for the source directory
#[derive(Debug)]
pub struct FileDiscovery {
    source_path: PathBuf,
    pattern: Pattern,
}

impl FileDiscovery {
    /// Create a discovery instance; `file_pattern` is a glob over file names
    pub fn new(source_path: PathBuf, file_pattern: &str) -> Result<Self> {
        let pattern = Pattern::new(file_pattern).map_err(|e| {
            AmenityError::configuration(format!("invalid file pattern '{}': {}", file_pattern, e))
        })?;
        Ok(Self {
            source_path,
            pattern,
        })
    }

    /// Discover spreadsheet files, sorted by file name
    ///
    /// Only the top level of the source directory is searched. Lock files
    /// left behind by office suites (`~$name.xlsx`) are ignored.
    pub fn discover(&self) -> Result<Vec<DiscoveredFile>> {
        if !self.source_path.is_dir() {
            return Err(AmenityError::SourceNotFound {
                path: self.source_path.clone(),
            });
        }

        debug!("Searching for spreadsheets in: {}", self.source_path.display());

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.source_path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name.starts_with("~$") || !self.pattern.matches(file_name) {
                continue;
            }

            if let Some(format) = SourceFormat::from_path(&path) {
                files.push(DiscoveredFile {
                    file_name: file_name.to_string(),
                    path: path.clone(),
                    format,
                });
            }
        }

        files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        debug!("Found {} spreadsheet files", files.len());

        Ok(files)
    }
}
