//! Geographic validity filter for the point export

use crate::config::GeoBounds;
use crate::constants::{LATITUDE_FIELD, LONGITUDE_FIELD};
use crate::error::Result;

use polars::prelude::*;
use tracing::{debug, warn};

/// Keep rows whose coordinates fall inside `bounds` (inclusive)
///
/// Null and NaN coordinates never pass. Without both coordinate columns
/// nothing can be placed, so the result is empty.
pub fn filter_valid_coordinates(df: &DataFrame, bounds: &GeoBounds) -> Result<DataFrame> {
    for field in [LATITUDE_FIELD, LONGITUDE_FIELD] {
        if df.get_column_index(field).is_none() {
            warn!("Column '{}' not present; no rows can be exported as points", field);
            return Ok(df.head(Some(0)));
        }
    }

    let lat = col(LATITUDE_FIELD).cast(DataType::Float64);
    let lon = col(LONGITUDE_FIELD).cast(DataType::Float64);

    let predicate = lat
        .clone()
        .is_not_nan()
        .and(lon.clone().is_not_nan())
        .and(lat.clone().gt_eq(lit(bounds.latitude.min)))
        .and(lat.lt_eq(lit(bounds.latitude.max)))
        .and(lon.clone().gt_eq(lit(bounds.longitude.min)))
        .and(lon.lt_eq(lit(bounds.longitude.max)));

    // null comparisons evaluate to null, which filter drops
    let filtered = df.clone().lazy().filter(predicate).collect()?;

    debug!(
        "Geo filter kept {} of {} rows",
        filtered.height(),
        df.height()
    );
    Ok(filtered)
}
