//! Amenity normalization module
//!
//! Rewrites each amenity column into the `yes` / `no` / null vocabulary in
//! two stages. Stage one maps the recognised encodings explicitly; stage two
//! resolves whatever is left according to the configured catch-all policy.

use crate::config::{CatchAllPolicy, NormalizationConfig};
use crate::constants::{FALSE_TOKENS, MISSING_LABEL, TRUE_TOKENS};
use crate::error::Result;
use crate::models::{Amenity, CellValue, ColumnAudit, ValueDistribution, series_cells};

use polars::prelude::*;
use tracing::{debug, info};

/// Outcome of the explicit mapping stage for one cell
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Missing,
    Resolved(Amenity),
    /// A value no explicit mapping recognised, in canonical text form
    Unrecognised(String),
}

impl Resolution {
    fn distribution_label(&self) -> String {
        match self {
            Resolution::Missing => MISSING_LABEL.to_string(),
            Resolution::Resolved(amenity) => amenity.as_str().to_string(),
            Resolution::Unrecognised(value) => value.clone(),
        }
    }
}

/// Stage one: map recognised encodings of presence and absence
///
/// Text is trimmed before matching and blank text counts as missing.
/// Numeric 0 and 1 are read as their boolean equivalents.
pub fn explicit_mapping(cell: &CellValue) -> Resolution {
    match cell {
        CellValue::Missing => Resolution::Missing,
        CellValue::Bool(true) => Resolution::Resolved(Amenity::Yes),
        CellValue::Bool(false) => Resolution::Resolved(Amenity::No),
        CellValue::Int(0) => Resolution::Resolved(Amenity::No),
        CellValue::Int(1) => Resolution::Resolved(Amenity::Yes),
        CellValue::Float(v) if *v == 0.0 => Resolution::Resolved(Amenity::No),
        CellValue::Float(v) if *v == 1.0 => Resolution::Resolved(Amenity::Yes),
        CellValue::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                Resolution::Missing
            } else if FALSE_TOKENS.contains(&text) {
                Resolution::Resolved(Amenity::No)
            } else if TRUE_TOKENS.contains(&text) {
                Resolution::Resolved(Amenity::Yes)
            } else {
                Resolution::Unrecognised(text.to_string())
            }
        }
        other => Resolution::Unrecognised(other.distribution_label()),
    }
}

/// Stage two: resolve unrecognised values with the catch-all policy
pub fn catch_all(resolution: &Resolution, policy: CatchAllPolicy) -> Option<Amenity> {
    match resolution {
        Resolution::Missing => None,
        Resolution::Resolved(amenity) => Some(*amenity),
        Resolution::Unrecognised(_) => match policy {
            CatchAllPolicy::AssumePresent => Some(Amenity::Yes),
            CatchAllPolicy::AssumeAbsent => Some(Amenity::No),
            CatchAllPolicy::TreatAsMissing => None,
        },
    }
}

/// Normalize a single column of cells, returning the new values and its audit
pub fn normalize_cells(
    column: &str,
    cells: &[CellValue],
    policy: CatchAllPolicy,
) -> (Vec<Option<Amenity>>, ColumnAudit) {
    let mut before = ValueDistribution::new();
    let mut after_explicit = ValueDistribution::new();
    let mut after_catch_all = ValueDistribution::new();
    let mut values = Vec::with_capacity(cells.len());

    for cell in cells {
        *before.entry(cell.distribution_label()).or_default() += 1;

        let resolution = explicit_mapping(cell);
        *after_explicit
            .entry(resolution.distribution_label())
            .or_default() += 1;

        let value = catch_all(&resolution, policy);
        let label = value.map_or_else(|| MISSING_LABEL.to_string(), |a| a.as_str().to_string());
        *after_catch_all.entry(label).or_default() += 1;

        values.push(value);
    }

    let audit = ColumnAudit {
        column: column.to_string(),
        before,
        after_explicit,
        after_catch_all,
    };
    (values, audit)
}

/// Build the normalized text column for one amenity column
pub fn normalized_column(
    column: &str,
    cells: &[CellValue],
    policy: CatchAllPolicy,
) -> (Column, ColumnAudit) {
    let (values, audit) = normalize_cells(column, cells, policy);
    let values: Vec<Option<&str>> = values.iter().map(|v| v.map(|a| a.as_str())).collect();
    (Series::new(column.into(), values).into(), audit)
}

/// Normalize the configured amenity columns of one source frame in place
///
/// Cells are read with the dtype the source gave them, so a numeric `1`
/// is still a number when it is mapped. Absent columns are skipped; each
/// normalized column becomes text holding only `yes`, `no` or null.
pub fn normalize_amenities(
    df: &mut DataFrame,
    config: &NormalizationConfig,
) -> Result<Vec<ColumnAudit>> {
    let mut audits = Vec::new();

    for column in &config.amenity_columns {
        if df.get_column_index(column).is_none() {
            debug!("Amenity column '{}' not in this source", column);
            continue;
        }

        let cells = series_cells(df.column(column)?.as_materialized_series())?;
        let (normalized, audit) = normalized_column(column, &cells, config.policy_for(column));
        df.with_column(normalized)?;
        audits.push(audit);
    }

    Ok(audits)
}

/// Sum per-source audits into one audit per column, in configured column order
pub fn merge_audits(columns: &[String], audits: &[ColumnAudit]) -> Vec<ColumnAudit> {
    columns
        .iter()
        .filter_map(|column| {
            let mut matching = audits.iter().filter(|audit| &audit.column == column);
            let mut merged = matching.next()?.clone();
            for audit in matching {
                merged.merge(audit);
            }
            Some(merged)
        })
        .collect()
}

/// Log the three value distributions of an audit against its source
pub fn log_audit(source: &str, audit: &ColumnAudit, policy: CatchAllPolicy) {
    info!(
        "{}: column '{}' before normalization: {}",
        source,
        audit.column,
        format_distribution(&audit.before)
    );
    info!(
        "{}: column '{}' after explicit mapping: {}",
        source,
        audit.column,
        format_distribution(&audit.after_explicit)
    );
    info!(
        "{}: column '{}' after catch-all ({:?}): {}",
        source,
        audit.column,
        policy,
        format_distribution(&audit.after_catch_all)
    );
}

fn format_distribution(distribution: &ValueDistribution) -> String {
    distribution
        .iter()
        .map(|(value, count)| format!("{}={}", value, count))
        .collect::<Vec<_>>()
        .join(", ")
}
