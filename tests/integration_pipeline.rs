//! Integration tests for the public merge API

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use stop_amenities::config::AgencyLabelMap;
use stop_amenities::{AmenityError, CatchAllPolicy, PipelineConfig, StopPipeline};
use tempfile::TempDir;

fn write_sources(temp_dir: &TempDir) -> std::path::PathBuf {
    let source = temp_dir.path().join("semi_processed");
    fs::create_dir_all(&source).unwrap();

    fs::write(
        source.join("LA_Metro_Bus_Stop_Amenities.csv"),
        "stop_id,stop_code,name,stop_lat,stop_lon,shelter,bench,bin\n\
         100,A1,Union Station,34.056,-118.234,Y,N,Existing\n\
         101,A2,Offshore,33.0,-130.0,N,N,\n",
    )
    .unwrap();
    fs::write(
        source.join("VVTA_Bus_Stop_Amenities.csv"),
        "stop_id,name,stop_lat,stop_lon,shelter,bench,wheelchair_boarding\n\
         V-7,Victorville TC,34.53,-117.29,Partial,Y,1\n\
         V-8,Unknown,,,None,,0\n",
    )
    .unwrap();
    fs::write(source.join("damaged.xlsx"), "PK\u{3}\u{4}truncated").unwrap();

    source
}

fn config_for(temp_dir: &TempDir) -> PipelineConfig {
    let labels: BTreeMap<String, String> = [
        ("LA_Metro_Bus_Stop_Amenities.csv", "LA Metro"),
        ("VVTA_Bus_Stop_Amenities.csv", "VVTA"),
    ]
    .into_iter()
    .map(|(file, agency)| (file.to_string(), agency.to_string()))
    .collect();

    PipelineConfig::default()
        .with_source_directory(write_sources(temp_dir))
        .with_output_directory(temp_dir.path().join("out"))
        .with_agency_labels(AgencyLabelMap::new(labels))
}

#[test]
fn test_end_to_end_merge() {
    let temp_dir = TempDir::new().unwrap();
    let summary = StopPipeline::new(config_for(&temp_dir))
        .unwrap()
        .with_progress(false)
        .run()
        .unwrap();

    assert_eq!(summary.files_discovered, 3);
    assert_eq!(summary.loaded_sources.len(), 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].source, "damaged.xlsx");
    assert_eq!(summary.rows_combined, 4);
    assert_eq!(summary.rows_geo_valid, 2);
    assert!(summary.rows_combined >= summary.rows_geo_valid);

    let json: Value =
        serde_json::from_str(&fs::read_to_string(&summary.geojson_path).unwrap()).unwrap();
    let features = json["features"].as_array().unwrap();
    let mut ids: Vec<&str> = features
        .iter()
        .map(|f| f["properties"]["stop_id"].as_str().unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["100", "V-7"]);

    for feature in features {
        for column in ["shelter", "bench", "bin", "wheelchair_boarding"] {
            let value = &feature["properties"][column];
            assert!(
                value.is_null() || value == "yes" || value == "no",
                "{} = {}",
                column,
                value
            );
        }
    }
}

#[test]
fn test_treat_as_missing_policy() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(&temp_dir).with_catch_all(CatchAllPolicy::TreatAsMissing);
    let summary = StopPipeline::new(config)
        .unwrap()
        .with_progress(false)
        .run()
        .unwrap();

    let shelter = summary
        .column_audits
        .iter()
        .find(|audit| audit.column == "shelter")
        .unwrap();
    assert_eq!(shelter.catch_all_resolved(), 1);
    assert_eq!(shelter.after_catch_all.get("yes"), Some(&1));
    assert_eq!(shelter.after_catch_all.get("no"), Some(&2));
}

#[test]
fn test_missing_source_directory() {
    let temp_dir = TempDir::new().unwrap();
    let config = PipelineConfig::default()
        .with_source_directory(temp_dir.path().join("absent"))
        .with_output_directory(temp_dir.path().join("out"));

    let result = StopPipeline::new(config).unwrap().with_progress(false).run();
    assert!(matches!(result, Err(AmenityError::SourceNotFound { .. })));
}
