//! Output writing module for merged amenity tables
//!
//! Writes the full normalized table as CSV and the geographically valid
//! subset as a GeoJSON point FeatureCollection.

use crate::constants::{LATITUDE_FIELD, LONGITUDE_FIELD};
use crate::error::{AmenityError, Result};
use crate::models::{CellValue, series_cells};

use geo::Point;
use polars::prelude::{CsvWriter, DataFrame, SerWriter};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

fn create_output_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| AmenityError::export_failed(path, format!("cannot create directory: {}", e)))?;
    }
    File::create(path).map_err(|e| AmenityError::export_failed(path, e.to_string()))
}

/// Flat CSV exporter for the unfiltered table
#[derive(Debug, Clone)]
pub struct CsvExporter {
    output_path: PathBuf,
}

impl CsvExporter {
    pub fn new(output_path: PathBuf) -> Self {
        Self { output_path }
    }

    /// Write `df` with a header row; nulls become empty fields
    pub fn write(&self, df: &mut DataFrame) -> Result<usize> {
        let mut file = create_output_file(&self.output_path)?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)
            .map_err(|e| AmenityError::export_failed(&self.output_path, e.to_string()))?;

        info!(
            "Wrote {} rows to {}",
            df.height(),
            self.output_path.display()
        );
        Ok(df.height())
    }
}

#[derive(Debug, Serialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: &'static str,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    geometry: PointGeometry,
    properties: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct PointGeometry {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: [f64; 2],
}

impl From<Point<f64>> for PointGeometry {
    fn from(point: Point<f64>) -> Self {
        Self {
            kind: "Point",
            coordinates: [point.x(), point.y()],
        }
    }
}

/// GeoJSON exporter for geo-valid rows
#[derive(Debug, Clone)]
pub struct GeoJsonExporter {
    output_path: PathBuf,
}

impl GeoJsonExporter {
    pub fn new(output_path: PathBuf) -> Self {
        Self { output_path }
    }

    /// Write one point feature per row that has both coordinates
    ///
    /// Every column, coordinates included, is copied into the feature
    /// properties. Returns the number of features written.
    pub fn write(&self, df: &DataFrame) -> Result<usize> {
        let collection = build_feature_collection(df)?;
        let count = collection.features.len();

        let file = create_output_file(&self.output_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &collection)
            .map_err(|e| AmenityError::export_failed(&self.output_path, e.to_string()))?;
        writer
            .flush()
            .map_err(|e| AmenityError::export_failed(&self.output_path, e.to_string()))?;

        info!(
            "Wrote {} point features to {}",
            count,
            self.output_path.display()
        );
        Ok(count)
    }
}

fn build_feature_collection(df: &DataFrame) -> Result<FeatureCollection> {
    let mut columns: Vec<(String, Vec<CellValue>)> = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let cells = series_cells(column.as_materialized_series())?;
        columns.push((column.name().to_string(), cells));
    }

    let position = |name: &str| columns.iter().position(|(column, _)| column == name);
    let (Some(lat_idx), Some(lon_idx)) = (position(LATITUDE_FIELD), position(LONGITUDE_FIELD))
    else {
        warn!("Coordinate columns absent; writing an empty FeatureCollection");
        return Ok(FeatureCollection {
            kind: "FeatureCollection",
            features: Vec::new(),
        });
    };

    let mut features = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let lat = columns[lat_idx].1[row].as_f64();
        let lon = columns[lon_idx].1[row].as_f64();
        let (Some(lat), Some(lon)) = (lat, lon) else {
            debug!("Skipping row {} without coordinates", row);
            continue;
        };

        let properties = columns
            .iter()
            .map(|(name, cells)| (name.clone(), cells[row].to_json()))
            .collect();

        features.push(Feature {
            kind: "Feature",
            geometry: Point::new(lon, lat).into(),
            properties,
        });
    }

    Ok(FeatureCollection {
        kind: "FeatureCollection",
        features,
    })
}
