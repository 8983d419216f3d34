//! Spreadsheet loading module
//!
//! Reads each discovered file into a polars `DataFrame`, normalizes its
//! amenity columns while every cell still has its source type, tags it with
//! its agency label and collects per-file failures so that one unreadable
//! file never aborts the batch.

use super::discovery::{DiscoveredFile, SourceFormat};
use super::normalizer::{log_audit, normalize_amenities, normalized_column};
use crate::config::{AgencyLabelMap, NormalizationConfig};
use crate::constants::IDENTIFIER_FIELDS;
use crate::error::{AmenityError, Result};
use crate::models::{CellValue, ColumnAudit, LoadFailure, SourceTable};

use calamine::{Data, Reader, open_workbook_auto};
use indicatif::ProgressBar;
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Everything the loader produced for one batch of files
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Successfully read tables, in discovery order
    pub tables: Vec<SourceTable>,
    pub failures: Vec<LoadFailure>,
    /// Files that are not in the agency label map
    pub unlabeled: Vec<String>,
}

/// Load every discovered file
///
/// Read or parse failures are logged and recorded; the remaining files are
/// still loaded.
pub fn load_sources(
    files: &[DiscoveredFile],
    labels: &AgencyLabelMap,
    normalization: &NormalizationConfig,
    progress: &ProgressBar,
) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();

    for file in files {
        progress.set_message(format!("Reading: {}", file.file_name));
        debug!("Reading {} as {:?}", file.path.display(), file.format);

        match read_source(&file.path, normalization) {
            Ok((frame, audits)) => {
                let (rows, columns) = frame.shape();
                info!(
                    "Ingested {} with shape ({}, {})",
                    file.file_name, rows, columns
                );
                for audit in &audits {
                    log_audit(&file.file_name, audit, normalization.policy_for(&audit.column));
                }

                let agency = labels.label_for(&file.file_name).map(str::to_string);
                if agency.is_none() {
                    info!(
                        "{} is not in the agency label map; its rows will have no agency",
                        file.file_name
                    );
                    outcome.unlabeled.push(file.file_name.clone());
                }

                outcome.tables.push(SourceTable {
                    source: file.file_name.clone(),
                    agency,
                    frame,
                    audits,
                });
            }
            Err(e) => {
                error!("Failed to read {}: {}", file.path.display(), e);
                outcome.failures.push(LoadFailure {
                    source: file.file_name.clone(),
                    reason: e.to_string(),
                });
            }
        }

        progress.inc(1);
    }

    outcome
}

/// Read one spreadsheet, choosing the reader by extension, and normalize its
/// amenity columns
pub fn read_source(
    path: &Path,
    normalization: &NormalizationConfig,
) -> Result<(DataFrame, Vec<ColumnAudit>)> {
    match SourceFormat::from_path(path) {
        Some(SourceFormat::Csv) => {
            let mut df = read_csv(path)?;
            let audits = normalize_amenities(&mut df, normalization)?;
            Ok((df, audits))
        }
        Some(SourceFormat::Workbook) => workbook_frame(read_workbook(path)?, normalization),
        None => Err(AmenityError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Read a delimited file with a header row
///
/// Identifier columns are read as text so that codes such as `007` keep
/// their leading zeros. Other column types are inferred from every row.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let header = CsvReadOptions::default()
        .with_has_header(true)
        .with_n_rows(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let identifiers: Schema = header
        .get_column_names()
        .iter()
        .filter(|name| IDENTIFIER_FIELDS.contains(&name.trim()))
        .map(|name| ((*name).clone(), DataType::String))
        .collect();
    let overwrite = (!identifiers.is_empty()).then(|| Arc::new(identifiers));

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_schema_overwrite(overwrite)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    // Header cells often carry stray whitespace in hand-edited exports
    let padded: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .filter(|name| name.trim() != name.as_str())
        .collect();
    for name in padded {
        let trimmed = name.trim().to_string();
        if df.get_column_index(&trimmed).is_none() {
            df.rename(&name, trimmed.into())?;
        }
    }

    debug!("Read CSV {} ({} rows)", path.display(), df.height());
    Ok(df)
}

/// Header names and typed cells of one worksheet
pub type SheetColumns = Vec<(String, Vec<CellValue>)>;

/// Read the first worksheet of a workbook; the first row is the header
///
/// Rows with no value in any column are dropped.
pub fn read_workbook(path: &Path) -> Result<SheetColumns> {
    let mut workbook = open_workbook_auto(path).map_err(|source| AmenityError::Spreadsheet {
        path: path.to_path_buf(),
        source,
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AmenityError::EmptyWorkbook {
            path: path.to_path_buf(),
        })?
        .map_err(|source| AmenityError::Spreadsheet {
            path: path.to_path_buf(),
            source,
        })?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        debug!("Worksheet in {} is empty", path.display());
        return Ok(Vec::new());
    };

    let headers = header_names(header_row.iter().map(cell_from_data));
    let mut columns: Vec<Vec<CellValue>> = vec![Vec::new(); headers.len()];

    for row in rows {
        let cells: Vec<CellValue> = (0..headers.len())
            .map(|idx| row.get(idx).map(cell_from_data).unwrap_or(CellValue::Missing))
            .collect();
        if cells.iter().all(CellValue::is_missing) {
            continue;
        }
        for (column, cell) in columns.iter_mut().zip(cells) {
            column.push(cell);
        }
    }

    debug!(
        "Read workbook {} ({} rows)",
        path.display(),
        columns.first().map_or(0, Vec::len)
    );
    Ok(headers.into_iter().zip(columns).collect())
}

/// Build a frame from worksheet cells, normalizing amenity columns from the
/// typed cells before they are packed into polars columns
pub fn workbook_frame(
    sheet: SheetColumns,
    normalization: &NormalizationConfig,
) -> Result<(DataFrame, Vec<ColumnAudit>)> {
    let mut audits = Vec::new();
    let columns: Vec<Column> = sheet
        .iter()
        .map(|(name, cells)| {
            if normalization.amenity_columns.contains(name) {
                let (column, audit) =
                    normalized_column(name, cells, normalization.policy_for(name));
                audits.push(audit);
                column
            } else {
                column_from_cells(name, cells)
            }
        })
        .collect();

    // keep audits in configured column order
    audits.sort_by_key(|audit| {
        normalization
            .amenity_columns
            .iter()
            .position(|column| column == &audit.column)
    });

    Ok((DataFrame::new(columns)?, audits))
}

/// Convert a workbook cell to a typed value
pub fn cell_from_data(cell: &Data) -> CellValue {
    match cell {
        Data::Int(v) => CellValue::Int(*v),
        Data::Float(v) if v.is_nan() => CellValue::Missing,
        Data::Float(v) => CellValue::Float(*v),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Text(
            dt.as_datetime()
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| dt.as_f64().to_string()),
        ),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        // Empty cells and formula errors such as #N/A
        _ => CellValue::Missing,
    }
}

/// Header names from the first row: trimmed, blanks named by position, duplicates suffixed
fn header_names(cells: impl Iterator<Item = CellValue>) -> Vec<String> {
    let mut seen = HashSet::new();
    cells
        .enumerate()
        .map(|(idx, cell)| {
            let base = cell
                .render()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("Unnamed: {}", idx));

            let mut name = base.clone();
            let mut suffix = 1;
            while !seen.insert(name.clone()) {
                name = format!("{}.{}", base, suffix);
                suffix += 1;
            }
            name
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Boolean,
    Integer,
    Float,
    Text,
}

fn infer_kind(cells: &[CellValue]) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for cell in cells {
        let cell_kind = match cell {
            CellValue::Missing => continue,
            CellValue::Bool(_) => ColumnKind::Boolean,
            CellValue::Int(_) => ColumnKind::Integer,
            CellValue::Float(_) => ColumnKind::Float,
            CellValue::Text(_) => return ColumnKind::Text,
        };
        kind = Some(match (kind, cell_kind) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(ColumnKind::Integer), ColumnKind::Float)
            | (Some(ColumnKind::Float), ColumnKind::Integer) => ColumnKind::Float,
            _ => return ColumnKind::Text,
        });
    }
    kind.unwrap_or(ColumnKind::Text)
}

/// Build a typed column from cells, falling back to text for mixed encodings
pub(crate) fn column_from_cells(name: &str, cells: &[CellValue]) -> Column {
    let series = match infer_kind(cells) {
        ColumnKind::Boolean => {
            let values: Vec<Option<bool>> = cells
                .iter()
                .map(|c| match c {
                    CellValue::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        ColumnKind::Integer => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|c| match c {
                    CellValue::Int(v) => Some(*v),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        ColumnKind::Float => {
            let values: Vec<Option<f64>> = cells.iter().map(CellValue::as_f64).collect();
            Series::new(name.into(), values)
        }
        ColumnKind::Text => {
            let values: Vec<Option<String>> = cells.iter().map(CellValue::render).collect();
            Series::new(name.into(), values)
        }
    };
    series.into()
}
