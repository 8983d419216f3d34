//! Command-line interface components.

use crate::config::{CatchAllPolicy, PipelineConfig};
use crate::models::RunSummary;
use crate::processor::StopPipeline;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, level_filters::LevelFilter};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug, Clone)]
#[command(name = "stop-amenities")]
#[command(about = "Merge bus-stop amenity spreadsheets into a normalized CSV and GeoJSON layer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Directory containing the agency spreadsheets (defaults to ./semi_processed)
    #[arg(value_name = "SOURCE_DIR")]
    pub source_dir: Option<PathBuf>,

    /// Directory the CSV, GeoJSON and log files are written to
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// How amenity values without an explicit mapping are resolved
    #[arg(long, value_enum, value_name = "POLICY")]
    pub catch_all: Option<CatchAllPolicy>,

    /// Run log file name, created in the output directory
    #[arg(long, value_name = "NAME")]
    pub log_file: Option<String>,

    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print warnings and errors to the terminal
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// Terminal log level; the run log always receives `log_level`
    pub fn stderr_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::WARN
        } else {
            self.log_level()
        }
    }

    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}

/// Build the run configuration: defaults, then the config file, then CLI overrides
pub fn load_configuration(args: &Args) -> Result<PipelineConfig> {
    let mut config =
        PipelineConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    if let Some(source_dir) = &args.source_dir {
        config = config.with_source_directory(source_dir);
    }
    if let Some(output_dir) = &args.output_dir {
        config = config.with_output_directory(output_dir);
    }
    if let Some(policy) = args.catch_all {
        config = config.with_catch_all(policy);
    }
    if let Some(log_file) = &args.log_file {
        config = config.with_log_file(log_file.clone());
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Set up structured logging to stderr and to a fresh run log
///
/// The log file is truncated on every run. The returned guard flushes the
/// file writer when dropped and must outlive the run.
pub fn setup_logging(args: &Args, log_path: &Path) -> Result<WorkerGuard> {
    use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("stop_amenities={}", log_level)));

    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let log_file = File::create(log_path)
        .with_context(|| format!("Failed to create log file {}", log_path.display()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .with_filter(args.stderr_level()),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(file_writer),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(guard)
}

/// Main command runner
pub fn run(args: Args) -> Result<RunSummary> {
    let config = load_configuration(&args)?;
    let _guard = setup_logging(&args, &config.output.log_path())?;

    info!("Starting stop amenities merge");
    debug!("Command line arguments: {:?}", args);
    debug!("Loaded configuration: {:?}", config);

    let summary = StopPipeline::new(config)
        .and_then(|pipeline| pipeline.with_progress(args.show_progress()).run())
        .map_err(|e| {
            error!("Merge failed: {}", e);
            e
        })?;

    info!(
        "Merge complete: {} rows combined, {} rows exported as points",
        summary.rows_combined, summary.rows_geo_valid
    );
    Ok(summary)
}

/// Print the coloured run summary to stdout
pub fn print_summary(summary: &RunSummary) {
    println!("\n{}", "Merge Summary".bright_green().bold());
    println!(
        "  {} {}",
        "Started:".bright_cyan(),
        summary.started_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        summary.processing_time_ms.to_string().bright_white()
    );
    println!(
        "  {} {} discovered, {} loaded",
        "Files:".bright_cyan(),
        summary.files_discovered.to_string().bright_white(),
        summary.loaded_sources.len().to_string().bright_white()
    );
    if !summary.failures.is_empty() {
        println!(
            "  {} {}",
            "Files failed:".bright_red(),
            summary.failures.len().to_string().bright_red().bold()
        );
        for failure in &summary.failures {
            println!("    {} {}", failure.source.bright_red(), failure.reason);
        }
    }
    if !summary.unlabeled_sources.is_empty() {
        println!(
            "  {} {}",
            "Without agency label:".bright_yellow(),
            summary.unlabeled_sources.join(", ")
        );
    }
    if !summary.missing_amenity_columns.is_empty() {
        println!(
            "  {} {}",
            "Amenity columns absent:".bright_yellow(),
            summary.missing_amenity_columns.join(", ")
        );
    }
    println!(
        "  {} {}",
        "Rows combined:".bright_cyan(),
        summary.rows_combined.to_string().bright_white().bold()
    );
    println!(
        "  {} {}",
        "Rows with valid points:".bright_cyan(),
        summary.rows_geo_valid.to_string().bright_white().bold()
    );
    println!(
        "  {} {}",
        "Rows excluded from points:".bright_cyan(),
        summary.rows_excluded().to_string().bright_white()
    );
    println!(
        "  {} {}",
        "CSV:".bright_cyan(),
        summary.csv_path.display()
    );
    println!(
        "  {} {}",
        "GeoJSON:".bright_cyan(),
        summary.geojson_path.display()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_args_parse_defaults() {
        let args = Args::try_parse_from(["stop-amenities"]).unwrap();
        assert!(args.source_dir.is_none());
        assert_eq!(args.log_level(), LevelFilter::INFO);
        assert!(args.show_progress());
    }

    #[test]
    fn test_args_verbosity_and_quiet() {
        let args = Args::try_parse_from(["stop-amenities", "-vv"]).unwrap();
        assert_eq!(args.log_level(), LevelFilter::TRACE);

        let args = Args::try_parse_from(["stop-amenities", "-q"]).unwrap();
        assert_eq!(args.stderr_level(), LevelFilter::WARN);
        assert_eq!(args.log_level(), LevelFilter::INFO);
        assert!(!args.show_progress());

        assert!(Args::try_parse_from(["stop-amenities", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_catch_all_value_parsing() {
        let args =
            Args::try_parse_from(["stop-amenities", "--catch-all", "treat-as-missing"]).unwrap();
        assert_eq!(args.catch_all, Some(CatchAllPolicy::TreatAsMissing));
        assert!(Args::try_parse_from(["stop-amenities", "--catch-all", "maybe"]).is_err());
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
source_directory = "from_file"

[normalization]
catch_all = "assume-absent"

[output]
directory = "file_output"
"#,
        )
        .unwrap();

        let args = Args::try_parse_from([
            "stop-amenities",
            "cli_source",
            "-c",
            config_path.to_str().unwrap(),
            "--log-file",
            "run.log",
        ])
        .unwrap();
        let config = load_configuration(&args).unwrap();

        assert_eq!(config.source_directory, PathBuf::from("cli_source"));
        assert_eq!(config.output.directory, PathBuf::from("file_output"));
        assert_eq!(config.normalization.catch_all, CatchAllPolicy::AssumeAbsent);
        assert_eq!(config.output.log_file, "run.log");
    }

    // The only test that installs the global subscriber
    #[test]
    fn test_fatal_error_written_to_run_log() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("no_such_dir");
        let output = temp_dir.path().join("output");

        let args = Args::try_parse_from([
            "stop-amenities",
            missing.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "-q",
        ])
        .unwrap();
        assert!(run(args).is_err());

        let log = fs::read_to_string(output.join("amenity_merge.log")).unwrap();
        assert!(log.contains("Merge failed"));
        assert!(log.contains("Source directory not found"));
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let args =
            Args::try_parse_from(["stop-amenities", "-c", "/nonexistent/config.toml"]).unwrap();
        assert!(load_configuration(&args).is_err());
    }
}
