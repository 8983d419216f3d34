//! Stop Amenities Library
//!
//! Merges bus-stop amenity spreadsheets published by several transit
//! agencies into one table. Amenity flags recorded in each agency's own
//! vocabulary are normalized to `yes` / `no` / missing, the merged table is
//! written as CSV, and the rows with plausible coordinates are written as a
//! GeoJSON point layer.
//!
//! This library provides tools for:
//! - Discovering and loading workbooks and CSV files, skipping unreadable ones
//! - Projecting each table onto a field whitelist and tagging its agency
//! - Two-stage amenity normalization with a configurable catch-all policy
//! - Bounding-box filtering and GeoJSON export

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod processor;

pub use config::{CatchAllPolicy, GeoBounds, PipelineConfig};
pub use error::{AmenityError, Result};
pub use models::{Amenity, CellValue, ColumnAudit, RunSummary};
pub use processor::StopPipeline;
