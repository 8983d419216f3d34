//! Application constants for the stop amenities merger
//!
//! Field names, default configuration values and the value vocabularies
//! used by the amenity normalizer.

// =============================================================================
// Field Names
// =============================================================================

pub const OPERATOR_FIELD: &str = "operator";
pub const STOP_ID_FIELD: &str = "stop_id";
pub const LATITUDE_FIELD: &str = "stop_lat";
pub const LONGITUDE_FIELD: &str = "stop_lon";

/// Column injected by the combiner; never present in source data
pub const AGENCY_FIELD: &str = "agency";

/// Semantic fields retained from each source table, in output order
pub const DEFAULT_FIELD_WHITELIST: &[&str] = &[
    OPERATOR_FIELD,
    STOP_ID_FIELD,
    "stop_code",
    "name",
    LATITUDE_FIELD,
    LONGITUDE_FIELD,
    "shelter",
    "bench",
    "lit",
    "rt_signage",
    "bin",
    "parent_station",
    "wheelchair_boarding",
];

/// Code columns always read as text
pub const IDENTIFIER_FIELDS: &[&str] = &[STOP_ID_FIELD, "stop_code", "parent_station"];

/// Tri-state amenity flag columns
pub const DEFAULT_AMENITY_COLUMNS: &[&str] = &[
    "shelter",
    "bench",
    "wheelchair_boarding",
    "lit",
    "bin",
    "rt_signage",
];

// =============================================================================
// Agency Labels
// =============================================================================

/// Known source files and the agency each one describes
pub const DEFAULT_AGENCY_LABELS: &[(&str, &str)] = &[
    ("LA_Metro_Bus_Stop_Amenities.xlsx", "LA Metro"),
    ("VVTA_Bus_Stop_Amenities.xlsx", "VVTA"),
    ("SFMTA_Bus_Stop_Amenities_Updated_Feb_2024.xlsx", "SFMTA"),
    (
        "Santa_Clara_Valley_Transportation_Authority_Bus_Stop_Amenities_Updated_2020.xlsx",
        "Santa Clara VTA",
    ),
    (
        "Santa_Monica_BBB_Bus_Stop_Amenities.xlsx",
        "Santa Monica Big Blue Bus",
    ),
];

// =============================================================================
// Geographic Bounds (California deployment)
// =============================================================================

pub const DEFAULT_MIN_LATITUDE: f64 = 32.0;
pub const DEFAULT_MAX_LATITUDE: f64 = 42.0;
pub const DEFAULT_MIN_LONGITUDE: f64 = -125.0;
pub const DEFAULT_MAX_LONGITUDE: f64 = -114.0;

// =============================================================================
// Input / Output Locations
// =============================================================================

pub const DEFAULT_SOURCE_DIRECTORY: &str = "semi_processed";
pub const DEFAULT_OUTPUT_DIRECTORY: &str = ".";
pub const DEFAULT_CSV_FILE_NAME: &str = "combined_df.csv";
pub const DEFAULT_GEOJSON_FILE_NAME: &str = "stops_with_points.geojson";
pub const DEFAULT_LOG_FILE_NAME: &str = "amenity_merge.log";

/// Matches every file name; the extension check still applies
pub const DEFAULT_FILE_PATTERN: &str = "*";

/// Application directory name under the user config directory
pub const CONFIG_DIR_NAME: &str = "stop-amenities";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Workbook extensions read through calamine
pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];
pub const CSV_EXTENSION: &str = "csv";

// =============================================================================
// Normalizer Vocabulary
// =============================================================================

pub const YES: &str = "yes";
pub const NO: &str = "no";

/// Text tokens that explicitly mark an amenity as absent
pub const FALSE_TOKENS: &[&str] = &["No", "no", "False", "None", "N", "n", "0"];

/// Text tokens that explicitly mark an amenity as present
pub const TRUE_TOKENS: &[&str] = &["Yes", "yes", "True", "Y", "y", "Existing"];

/// Label used for null cells in value distributions
pub const MISSING_LABEL: &str = "<missing>";
