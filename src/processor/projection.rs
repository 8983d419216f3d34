//! Column projection onto the field whitelist

use crate::error::Result;
use polars::prelude::*;
use tracing::warn;

/// Result of projecting one table
#[derive(Debug, Clone)]
pub struct Projection {
    pub frame: DataFrame,
    /// Whitelisted fields the source table did not have
    pub missing: Vec<String>,
}

/// Keep only whitelisted fields that exist, in whitelist order
///
/// Absent fields are omitted and reported, never an error.
pub fn project_columns(df: &DataFrame, whitelist: &[String]) -> Result<Projection> {
    let (present, missing): (Vec<&String>, Vec<&String>) = whitelist
        .iter()
        .partition(|field| df.get_column_index(field.as_str()).is_some());

    let frame = df.select(present.iter().map(|field| field.as_str()))?;

    Ok(Projection {
        frame,
        missing: missing.into_iter().cloned().collect(),
    })
}

/// Project a source table and log any absent fields against its file name
pub fn project_source(source: &str, df: &DataFrame, whitelist: &[String]) -> Result<DataFrame> {
    let projection = project_columns(df, whitelist)?;
    if !projection.missing.is_empty() {
        warn!(
            "{} is missing expected fields: {}",
            source,
            projection.missing.join(", ")
        );
    }
    Ok(projection.frame)
}
