//! Core data structures and types for amenity merging.
//!
//! Defines the typed cell value used to read heterogeneous spreadsheet
//! encodings, loaded source tables, audit records and run statistics.

use crate::constants::{MISSING_LABEL, NO, YES};
use chrono::{DateTime, Local};
use polars::prelude::{AnyValue, DataFrame, PolarsResult, Series};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A single spreadsheet cell with its source encoding preserved
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Missing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// Convert a polars value into a typed cell
    ///
    /// NaN floats are treated as missing, matching how spreadsheet
    /// readers report blank numeric cells.
    pub fn from_any_value(value: &AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => CellValue::Missing,
            AnyValue::Boolean(b) => CellValue::Bool(*b),
            AnyValue::String(s) => CellValue::Text((*s).to_string()),
            AnyValue::StringOwned(s) => CellValue::Text(s.to_string()),
            AnyValue::Int8(v) => CellValue::Int(i64::from(*v)),
            AnyValue::Int16(v) => CellValue::Int(i64::from(*v)),
            AnyValue::Int32(v) => CellValue::Int(i64::from(*v)),
            AnyValue::Int64(v) => CellValue::Int(*v),
            AnyValue::UInt8(v) => CellValue::Int(i64::from(*v)),
            AnyValue::UInt16(v) => CellValue::Int(i64::from(*v)),
            AnyValue::UInt32(v) => CellValue::Int(i64::from(*v)),
            AnyValue::UInt64(v) => match i64::try_from(*v) {
                Ok(v) => CellValue::Int(v),
                Err(_) => CellValue::Float(*v as f64),
            },
            AnyValue::Float32(v) => CellValue::from_float(f64::from(*v)),
            AnyValue::Float64(v) => CellValue::from_float(*v),
            other => CellValue::Text(other.to_string()),
        }
    }

    fn from_float(value: f64) -> Self {
        if value.is_nan() {
            CellValue::Missing
        } else {
            CellValue::Float(value)
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// Canonical text form used for identifiers and dtype promotion
    ///
    /// Integral floats drop their fractional part so that `123` read from a
    /// workbook and `123` read from a CSV produce the same identifier.
    pub fn render(&self) -> Option<String> {
        match self {
            CellValue::Missing => None,
            CellValue::Bool(true) => Some("True".to_string()),
            CellValue::Bool(false) => Some("False".to_string()),
            CellValue::Int(v) => Some(v.to_string()),
            CellValue::Float(v) => Some(render_float(*v)),
            CellValue::Text(s) => Some(s.clone()),
        }
    }

    /// Numeric reading of the cell; text is parsed after trimming
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(v) => Some(*v as f64),
            CellValue::Float(v) => Some(*v),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| !v.is_nan()),
            CellValue::Missing | CellValue::Bool(_) => None,
        }
    }

    /// JSON representation used for GeoJSON feature properties
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Missing => serde_json::Value::Null,
            CellValue::Bool(b) => serde_json::Value::Bool(*b),
            CellValue::Int(v) => serde_json::Value::from(*v),
            CellValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            CellValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Label used when counting values for audit distributions
    pub fn distribution_label(&self) -> String {
        self.render().unwrap_or_else(|| MISSING_LABEL.to_string())
    }
}

/// Read every value of a series as typed cells
pub fn series_cells(series: &Series) -> PolarsResult<Vec<CellValue>> {
    (0..series.len())
        .map(|idx| series.get(idx).map(|value| CellValue::from_any_value(&value)))
        .collect()
}

fn render_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Canonical amenity presence value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Amenity {
    Yes,
    No,
}

impl Amenity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Amenity::Yes => YES,
            Amenity::No => NO,
        }
    }
}

/// A table read from one source file
#[derive(Debug, Clone)]
pub struct SourceTable {
    /// File name the table was read from
    pub source: String,
    /// Agency label, if the file is in the label map
    pub agency: Option<String>,
    /// Frame with amenity columns already normalized
    pub frame: DataFrame,
    /// One audit per amenity column present in this source
    pub audits: Vec<ColumnAudit>,
}

/// A source file that could not be read
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFailure {
    pub source: String,
    pub reason: String,
}

/// Count of each distinct value in a column
pub type ValueDistribution = BTreeMap<String, usize>;

/// Value distributions recorded while normalizing one amenity column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnAudit {
    pub column: String,
    pub before: ValueDistribution,
    pub after_explicit: ValueDistribution,
    pub after_catch_all: ValueDistribution,
}

impl ColumnAudit {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            before: ValueDistribution::new(),
            after_explicit: ValueDistribution::new(),
            after_catch_all: ValueDistribution::new(),
        }
    }

    /// Add another source's counts for the same column
    pub fn merge(&mut self, other: &ColumnAudit) {
        for (target, source) in [
            (&mut self.before, &other.before),
            (&mut self.after_explicit, &other.after_explicit),
            (&mut self.after_catch_all, &other.after_catch_all),
        ] {
            for (value, count) in source {
                *target.entry(value.clone()).or_default() += count;
            }
        }
    }

    /// Number of cells resolved by the catch-all stage rather than explicit mapping
    pub fn catch_all_resolved(&self) -> usize {
        self.after_explicit
            .iter()
            .filter(|(value, _)| {
                value.as_str() != YES && value.as_str() != NO && value.as_str() != MISSING_LABEL
            })
            .map(|(_, count)| count)
            .sum()
    }
}

/// Statistics and outcomes of one pipeline run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub files_discovered: usize,
    pub loaded_sources: Vec<String>,
    pub failures: Vec<LoadFailure>,
    pub unlabeled_sources: Vec<String>,
    pub rows_combined: usize,
    pub rows_geo_valid: usize,
    pub column_audits: Vec<ColumnAudit>,
    pub missing_amenity_columns: Vec<String>,
    pub csv_path: PathBuf,
    pub geojson_path: PathBuf,
    pub processing_time_ms: u128,
}

impl RunSummary {
    /// Rows present in the flat export but excluded from the GeoJSON export
    pub fn rows_excluded(&self) -> usize {
        self.rows_combined.saturating_sub(self.rows_geo_valid)
    }
}
