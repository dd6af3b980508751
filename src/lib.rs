//! Trip Cleaning Pipeline Library
//!
//! A bike-share trip data-cleaning library built with Rust and Polars.
//!
//! # Overview
//!
//! This library turns raw monthly trip exports into an analysis-ready table:
//!
//! - **Schema validation**: required columns, dtypes, and ride-id uniqueness
//! - **Quality filters**: missing end coordinates, unlisted stations,
//!   out-of-window rides, implausible durations
//! - **Coordinate resolution**: canonical station coordinates replace raw
//!   GPS fixes
//! - **Derived fields**: duration, month, hour, weekday, day of month
//! - **DST repair**: negative durations on the fall-back date get their
//!   hour back
//! - **Category recode**: bike and rider labels collapse to a canonical
//!   vocabulary
//! - **Audit report**: per-stage counts, removed-id samples, and an
//!   unlisted-station census
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use trip_cleaner::{CleanerConfig, StationReference, TripCleaner};
//! use chrono::NaiveDate;
//! use polars::prelude::*;
//!
//! let trips = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .try_into_reader_with_file_path(Some("202208-trips.csv".into()))?
//!     .finish()?;
//!
//! let reference = StationReference::new(stations_df)?;
//!
//! let config = CleanerConfig::builder()
//!     .end_date(NaiveDate::from_ymd_opt(2022, 8, 31).unwrap())
//!     .build()?;
//!
//! let batch = TripCleaner::builder().config(config).build()?.run(trips, &reference)?;
//!
//! println!(
//!     "{} -> {} rows ({} removed)",
//!     batch.report.rows_before, batch.report.rows_after, batch.report.rows_removed
//! );
//! ```

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod reference;
pub mod report;
pub mod schema;
pub mod stages;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{
    CleanerConfig, CleanerConfigBuilder, ConfigValidationError, DEFAULT_MAX_DURATION_SECONDS,
    DEFAULT_MIN_DURATION_SECONDS, DEFAULT_TIMEZONE,
};
pub use error::{CleaningError, Result as CleaningResult, ResultExt};
pub use output::{OutputWriter, DEFAULT_OUTPUT_NAME};
pub use pipeline::{CleanedBatch, TripCleaner, TripCleanerBuilder};
pub use reference::StationReference;
pub use report::{CleaningReport, ConfigEcho, Stage, StageReport};
pub use types::{BikeType, UserType};
