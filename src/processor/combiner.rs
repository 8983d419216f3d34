//! Table combination module
//!
//! Concatenates the projected source tables into one table. Each table is
//! tagged with its agency label first; columns whose types disagree
//! between files are promoted to text, coordinates are always read as
//! floats, and the stop identifier is rewritten as text after the merge.

use super::projection::project_source;
use crate::constants::{AGENCY_FIELD, LATITUDE_FIELD, LONGITUDE_FIELD, STOP_ID_FIELD};
use crate::error::Result;
use crate::models::{SourceTable, series_cells};

use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Combine source tables into one table with whitelist column order plus `agency`
///
/// An empty input yields an empty frame; callers decide whether that is fatal.
pub fn combine_tables(tables: &[SourceTable], whitelist: &[String]) -> Result<DataFrame> {
    if tables.is_empty() {
        return Ok(DataFrame::empty());
    }

    let mut frames = Vec::with_capacity(tables.len());
    for table in tables {
        let projected = project_source(&table.source, &table.frame, whitelist)?;
        let labeled = attach_agency(projected, table.frame.height(), table.agency.as_deref())?;
        frames.push(coerce_coordinates(labeled)?);
    }

    harmonize_dtypes(&mut frames)?;

    let lazy_frames: Vec<LazyFrame> = frames.into_iter().map(|df| df.lazy()).collect();
    let mut combined = concat_lf_diagonal(lazy_frames, UnionArgs::default())?.collect()?;

    if combined.get_column_index(STOP_ID_FIELD).is_some() {
        let stop_ids = column_to_text(combined.column(STOP_ID_FIELD)?)?;
        combined.with_column(stop_ids)?;
    } else {
        warn!("No source table has a {} column", STOP_ID_FIELD);
    }

    let order: Vec<&str> = whitelist
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(AGENCY_FIELD))
        .filter(|name| combined.get_column_index(name).is_some())
        .collect();
    let combined = combined.select(order)?;

    debug!(
        "Combined {} tables into {} rows x {} columns",
        tables.len(),
        combined.height(),
        combined.width()
    );
    Ok(combined)
}

/// Add the agency label column; `rows` is the source height so that tables
/// with no whitelisted fields still contribute their rows
fn attach_agency(mut df: DataFrame, rows: usize, agency: Option<&str>) -> Result<DataFrame> {
    let labels: Vec<Option<&str>> = vec![agency; rows];
    let column: Column = Series::new(AGENCY_FIELD.into(), labels).into();

    if df.width() == 0 {
        return Ok(DataFrame::new(vec![column])?);
    }
    df.with_column(column)?;
    Ok(df)
}

/// Read coordinate columns as Float64; unparseable values become null
fn coerce_coordinates(mut df: DataFrame) -> Result<DataFrame> {
    for field in [LATITUDE_FIELD, LONGITUDE_FIELD] {
        if df.get_column_index(field).is_none() {
            continue;
        }
        let column = df.column(field)?;
        if column.dtype() == &DataType::Float64 {
            continue;
        }
        let coerced = column_to_float(column)?;
        df.with_column(coerced)?;
    }
    Ok(df)
}

/// Promote columns whose dtype differs between frames to text
fn harmonize_dtypes(frames: &mut [DataFrame]) -> Result<()> {
    let mut dtypes: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for df in frames.iter() {
        for column in df.get_columns() {
            dtypes
                .entry(column.name().to_string())
                .or_default()
                .insert(column.dtype().to_string());
        }
    }

    let conflicting: Vec<String> = dtypes
        .into_iter()
        .filter(|(_, types)| types.len() > 1)
        .map(|(name, types)| {
            debug!(
                "Column {} has mixed types across files ({}); promoting to text",
                name,
                types.into_iter().collect::<Vec<_>>().join(", ")
            );
            name
        })
        .collect();

    for df in frames.iter_mut() {
        for name in &conflicting {
            if df.get_column_index(name).is_none() {
                continue;
            }
            let text = column_to_text(df.column(name)?)?;
            df.with_column(text)?;
        }
    }
    Ok(())
}

/// Rewrite a column as text using the canonical cell rendering
pub(crate) fn column_to_text(column: &Column) -> Result<Column> {
    if column.dtype() == &DataType::String {
        return Ok(column.clone());
    }
    let series = column.as_materialized_series();
    let values: Vec<Option<String>> = series_cells(series)?
        .iter()
        .map(|cell| cell.render())
        .collect();
    Ok(Series::new(series.name().clone(), values).into())
}

fn column_to_float(column: &Column) -> Result<Column> {
    let series = column.as_materialized_series();
    let values: Vec<Option<f64>> = series_cells(series)?
        .iter()
        .map(|cell| cell.as_f64())
        .collect();
    Ok(Series::new(series.name().clone(), values).into())
}
