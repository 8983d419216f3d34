//! Main processing engine for amenity merging.
//!
//! Orchestrates the merge workflow: discover source spreadsheets, load and
//! normalize each one, combine the projected tables, export the flat table,
//! filter to valid coordinates and export the point layer.

pub mod combiner;
pub mod discovery;
pub mod geo_filter;
pub mod loader;
pub mod normalizer;
pub mod projection;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::{
    combiner::combine_tables,
    discovery::FileDiscovery,
    geo_filter::filter_valid_coordinates,
    loader::load_sources,
    normalizer::merge_audits,
    writer::{CsvExporter, GeoJsonExporter},
};

use crate::config::PipelineConfig;
use crate::error::{AmenityError, Result};
use crate::models::RunSummary;

use chrono::Local;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Merge pipeline for a directory of amenity spreadsheets
#[derive(Debug)]
pub struct StopPipeline {
    config: PipelineConfig,
    file_discovery: FileDiscovery,
    csv_exporter: CsvExporter,
    geojson_exporter: GeoJsonExporter,
    show_progress: bool,
}

impl StopPipeline {
    /// Create a pipeline from a validated configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let file_discovery =
            FileDiscovery::new(config.source_directory.clone(), &config.file_pattern)?;
        let csv_exporter = CsvExporter::new(config.output.csv_path());
        let geojson_exporter = GeoJsonExporter::new(config.output.geojson_path());

        Ok(Self {
            config,
            file_discovery,
            csv_exporter,
            geojson_exporter,
            show_progress: true,
        })
    }

    /// Enable or disable the progress bar and step output
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Run the merge end to end
    pub fn run(&self) -> Result<RunSummary> {
        let started_at = Local::now();
        let start_time = Instant::now();

        info!(
            "Starting amenity merge from {}",
            self.config.source_directory.display()
        );
        self.step(format!(
            "{} {}",
            "Starting amenity merge from".bright_green().bold(),
            self.config.source_directory.display()
        ));

        // Step 1: Discover spreadsheets
        let files = self.file_discovery.discover()?;
        self.step(format!(
            "  {} {} spreadsheet files",
            "Found".bright_green(),
            files.len().to_string().bright_white().bold()
        ));

        if self.config.agency_labels.is_empty() {
            warn!("No agency labels configured; every source will carry an empty agency");
        } else {
            debug!("{} agency labels configured", self.config.agency_labels.len());
        }

        // Step 2: Load and normalize every file, recording failures
        let progress = self.progress_bar(files.len() as u64);
        let outcome = load_sources(
            &files,
            &self.config.agency_labels,
            &self.config.normalization,
            &progress,
        );
        progress.finish_and_clear();

        if outcome.tables.is_empty() {
            return Err(AmenityError::NoTables {
                path: self.config.source_directory.clone(),
                failed: outcome.failures.len(),
            });
        }
        if !outcome.failures.is_empty() {
            warn!(
                "{} of {} files could not be read",
                outcome.failures.len(),
                files.len()
            );
        }

        // Step 3: Combine projected tables
        self.step(format!("{}", "Combining tables...".bright_yellow()));
        let mut combined = combine_tables(&outcome.tables, &self.config.field_whitelist)?;
        info!(
            "Combined table has shape ({}, {})",
            combined.height(),
            combined.width()
        );

        let amenity_columns = &self.config.normalization.amenity_columns;
        let source_audits: Vec<_> = outcome
            .tables
            .iter()
            .flat_map(|t| t.audits.iter().cloned())
            .collect();
        let column_audits = merge_audits(amenity_columns, &source_audits);

        let missing_amenity_columns: Vec<String> = amenity_columns
            .iter()
            .filter(|c| combined.column(c.as_str()).is_err())
            .cloned()
            .collect();
        for column in &missing_amenity_columns {
            warn!("Amenity column '{}' not found in any source", column);
        }

        // Step 4: Export the unfiltered table
        let rows_combined = self.csv_exporter.write(&mut combined)?;

        // Step 5: Filter to valid coordinates and export points
        self.step(format!("{}", "Exporting point layer...".bright_yellow()));
        let geo_valid = filter_valid_coordinates(&combined, &self.config.bounds)?;
        let rows_geo_valid = self.geojson_exporter.write(&geo_valid)?;

        if rows_geo_valid < rows_combined {
            info!(
                "{} rows fall outside the valid bounds and are excluded from {}",
                rows_combined - rows_geo_valid,
                self.config.output.geojson_file
            );
        }

        Ok(RunSummary {
            started_at,
            files_discovered: files.len(),
            loaded_sources: outcome.tables.iter().map(|t| t.source.clone()).collect(),
            failures: outcome.failures,
            unlabeled_sources: outcome.unlabeled,
            rows_combined,
            rows_geo_valid,
            column_audits,
            missing_amenity_columns,
            csv_path: self.config.output.csv_path(),
            geojson_path: self.config.output.geojson_path(),
            processing_time_ms: start_time.elapsed().as_millis(),
        })
    }

    fn step(&self, message: String) {
        if self.show_progress {
            println!("{}", message);
        }
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            progress.set_style(style.progress_chars("#>-"));
        }
        progress
    }
}
