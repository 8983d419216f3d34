//! Configuration management and validation.
//!
//! Provides the configuration structure passed to every pipeline
//! component: source location, field whitelist, agency labels, valid
//! coordinate bounds, normalization policy and output paths.

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_AGENCY_LABELS, DEFAULT_AMENITY_COLUMNS,
    DEFAULT_CSV_FILE_NAME, DEFAULT_FIELD_WHITELIST, DEFAULT_FILE_PATTERN,
    DEFAULT_GEOJSON_FILE_NAME, DEFAULT_LOG_FILE_NAME, DEFAULT_MAX_LATITUDE,
    DEFAULT_MAX_LONGITUDE, DEFAULT_MIN_LATITUDE, DEFAULT_MIN_LONGITUDE,
    DEFAULT_OUTPUT_DIRECTORY, DEFAULT_SOURCE_DIRECTORY,
};
use crate::error::{AmenityError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Mapping from source file name to human-readable agency name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgencyLabelMap(BTreeMap<String, String>);

impl AgencyLabelMap {
    pub fn new(labels: BTreeMap<String, String>) -> Self {
        Self(labels)
    }

    /// Agency label for a source file name, if known
    pub fn label_for(&self, file_name: &str) -> Option<&str> {
        self.0.get(file_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for AgencyLabelMap {
    fn default() -> Self {
        Self(
            DEFAULT_AGENCY_LABELS
                .iter()
                .map(|(file, agency)| (file.to_string(), agency.to_string()))
                .collect(),
        )
    }
}

/// Closed interval of valid coordinate values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateRange {
    pub min: f64,
    pub max: f64,
}

impl CoordinateRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Valid bounding region for the geospatial export
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoBounds {
    pub latitude: CoordinateRange,
    pub longitude: CoordinateRange,
}

impl Default for GeoBounds {
    fn default() -> Self {
        Self {
            latitude: CoordinateRange::new(DEFAULT_MIN_LATITUDE, DEFAULT_MAX_LATITUDE),
            longitude: CoordinateRange::new(DEFAULT_MIN_LONGITUDE, DEFAULT_MAX_LONGITUDE),
        }
    }
}

/// Resolution applied to amenity values that no explicit mapping recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CatchAllPolicy {
    /// Any annotation indicates the amenity is present
    #[default]
    AssumePresent,
    /// Unrecognised annotations indicate the amenity is absent
    AssumeAbsent,
    /// Unrecognised annotations are discarded
    TreatAsMissing,
}

/// Amenity normalization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Columns normalized to the yes/no vocabulary
    pub amenity_columns: Vec<String>,
    /// Policy for values no explicit mapping recognises
    pub catch_all: CatchAllPolicy,
    /// Per-column policy overrides
    pub column_overrides: BTreeMap<String, CatchAllPolicy>,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            amenity_columns: DEFAULT_AMENITY_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            catch_all: CatchAllPolicy::default(),
            column_overrides: BTreeMap::new(),
        }
    }
}

impl NormalizationConfig {
    /// Effective catch-all policy for a column
    pub fn policy_for(&self, column: &str) -> CatchAllPolicy {
        self.column_overrides
            .get(column)
            .copied()
            .unwrap_or(self.catch_all)
    }
}

/// Output file locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputPaths {
    pub directory: PathBuf,
    pub csv_file: String,
    pub geojson_file: String,
    pub log_file: String,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_OUTPUT_DIRECTORY),
            csv_file: DEFAULT_CSV_FILE_NAME.to_string(),
            geojson_file: DEFAULT_GEOJSON_FILE_NAME.to_string(),
            log_file: DEFAULT_LOG_FILE_NAME.to_string(),
        }
    }
}

impl OutputPaths {
    pub fn csv_path(&self) -> PathBuf {
        self.directory.join(&self.csv_file)
    }

    pub fn geojson_path(&self) -> PathBuf {
        self.directory.join(&self.geojson_file)
    }

    pub fn log_path(&self) -> PathBuf {
        self.directory.join(&self.log_file)
    }
}

/// Global configuration for an amenity merge run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory containing the source spreadsheets
    pub source_directory: PathBuf,

    /// Glob pattern source file names must match
    pub file_pattern: String,

    /// Fields retained from each source table, in output order
    pub field_whitelist: Vec<String>,

    pub agency_labels: AgencyLabelMap,

    pub bounds: GeoBounds,

    pub normalization: NormalizationConfig,

    pub output: OutputPaths,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_directory: PathBuf::from(DEFAULT_SOURCE_DIRECTORY),
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            field_whitelist: DEFAULT_FIELD_WHITELIST
                .iter()
                .map(|f| f.to_string())
                .collect(),
            agency_labels: AgencyLabelMap::default(),
            bounds: GeoBounds::default(),
            normalization: NormalizationConfig::default(),
            output: OutputPaths::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file, filling unset keys with defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AmenityError::configuration(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: PipelineConfig = toml::from_str(&content).map_err(|e| {
            AmenityError::configuration(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Default config file location in the user config directory
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from an explicit path, else the default location if present, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match Self::default_config_path().filter(|path| path.exists()) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Validate bounds, whitelist and file pattern
    pub fn validate(&self) -> Result<()> {
        if self.field_whitelist.is_empty() {
            return Err(AmenityError::configuration("field whitelist is empty"));
        }

        validate_range("latitude", &self.bounds.latitude, -90.0, 90.0)?;
        validate_range("longitude", &self.bounds.longitude, -180.0, 180.0)?;

        glob::Pattern::new(&self.file_pattern).map_err(|e| {
            AmenityError::configuration(format!(
                "invalid file pattern '{}': {}",
                self.file_pattern, e
            ))
        })?;

        for file in [
            &self.output.csv_file,
            &self.output.geojson_file,
            &self.output.log_file,
        ] {
            if file.trim().is_empty() {
                return Err(AmenityError::configuration("output file names must not be empty"));
            }
        }

        Ok(())
    }

    pub fn with_source_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_directory = path.into();
        self
    }

    pub fn with_output_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.output.directory = path.into();
        self
    }

    pub fn with_bounds(mut self, bounds: GeoBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_catch_all(mut self, policy: CatchAllPolicy) -> Self {
        self.normalization.catch_all = policy;
        self
    }

    pub fn with_agency_labels(mut self, labels: AgencyLabelMap) -> Self {
        self.agency_labels = labels;
        self
    }

    pub fn with_log_file(mut self, file_name: impl Into<String>) -> Self {
        self.output.log_file = file_name.into();
        self
    }
}

fn validate_range(axis: &str, range: &CoordinateRange, lower: f64, upper: f64) -> Result<()> {
    if range.min.is_nan() || range.max.is_nan() {
        return Err(AmenityError::configuration(format!(
            "{} range must not contain NaN",
            axis
        )));
    }
    if range.min > range.max {
        return Err(AmenityError::configuration(format!(
            "{} range is inverted: min {} > max {}",
            axis, range.min, range.max
        )));
    }
    if range.min < lower || range.max > upper {
        return Err(AmenityError::configuration(format!(
            "{} range [{}, {}] exceeds [{}, {}]",
            axis, range.min, range.max, lower, upper
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.field_whitelist.len(), 13);
        assert_eq!(config.normalization.amenity_columns.len(), 6);
        assert_eq!(config.agency_labels.len(), 5);
        assert_eq!(
            config.agency_labels.label_for("VVTA_Bus_Stop_Amenities.xlsx"),
            Some("VVTA")
        );
    }

    #[test]
    fn test_inverted_range_rejected() {
        let config = PipelineConfig::default().with_bounds(GeoBounds {
            latitude: CoordinateRange::new(42.0, 32.0),
            longitude: CoordinateRange::new(-125.0, -114.0),
        });
        assert!(matches!(
            config.validate(),
            Err(AmenityError::Configuration { .. })
        ));
    }

    #[test]
    fn test_out_of_globe_range_rejected() {
        let config = PipelineConfig::default().with_bounds(GeoBounds {
            latitude: CoordinateRange::new(-95.0, 42.0),
            longitude: CoordinateRange::new(-125.0, -114.0),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_file_pattern_rejected() {
        let config = PipelineConfig {
            file_pattern: "[".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_override() {
        let mut normalization = NormalizationConfig::default();
        normalization
            .column_overrides
            .insert("lit".to_string(), CatchAllPolicy::AssumeAbsent);

        assert_eq!(normalization.policy_for("lit"), CatchAllPolicy::AssumeAbsent);
        assert_eq!(
            normalization.policy_for("bench"),
            CatchAllPolicy::AssumePresent
        );
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
source_directory = "inputs"

[bounds.latitude]
min = 30.0
max = 45.0

[bounds.longitude]
min = -130.0
max = -110.0

[normalization]
catch_all = "treat-as-missing"

[normalization.column_overrides]
lit = "assume-absent"

[agency_labels]
"RTD_Stops.csv" = "RTD"
"#,
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.source_directory, PathBuf::from("inputs"));
        assert_eq!(config.bounds.latitude, CoordinateRange::new(30.0, 45.0));
        assert_eq!(config.normalization.catch_all, CatchAllPolicy::TreatAsMissing);
        assert_eq!(
            config.normalization.policy_for("lit"),
            CatchAllPolicy::AssumeAbsent
        );
        assert_eq!(config.agency_labels.label_for("RTD_Stops.csv"), Some("RTD"));
        // Untouched sections keep their defaults
        assert_eq!(config.field_whitelist.len(), 13);
        assert_eq!(config.output.csv_file, "combined_df.csv");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_toml_is_configuration_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "source_directory = [").unwrap();

        let result = PipelineConfig::from_file(&path);
        assert!(matches!(result, Err(AmenityError::Configuration { .. })));
    }

    #[test]
    fn test_output_paths_join_directory() {
        let config = PipelineConfig::default().with_output_directory("/tmp/out");
        assert_eq!(
            config.output.csv_path(),
            PathBuf::from("/tmp/out/combined_df.csv")
        );
        assert_eq!(
            config.output.geojson_path(),
            PathBuf::from("/tmp/out/stops_with_points.geojson")
        );
        assert_eq!(
            config.output.log_path(),
            PathBuf::from("/tmp/out/amenity_merge.log")
        );
    }
}
