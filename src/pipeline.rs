//! The trip-cleaning pipeline.
//!
//! This module provides the core `TripCleaner` struct and builder for
//! orchestrating the cleaning workflow.

use crate::config::CleanerConfig;
use crate::error::Result;
use crate::reference::StationReference;
use crate::report::CleaningReport;
use crate::schema::{validate_ride_id_uniqueness, validate_trip_schema};
use crate::stages::{
    add_derived_fields, drop_missing_end_coords, drop_unlisted_stations, enforce_duration_bounds,
    enforce_window, recode_categories, repair_dst_fallback, resolve_coordinates,
};
use polars::prelude::*;
use std::time::Instant;
use tracing::{error, info, warn};

/// Row-loss percentage above which the report carries a warning.
const HIGH_LOSS_WARNING_THRESHOLD: f64 = 30.0;

/// A cleaned batch together with its audit report.
#[derive(Debug, Clone)]
pub struct CleanedBatch {
    pub data: DataFrame,
    pub report: CleaningReport,
}

/// The trip-cleaning pipeline.
///
/// Use [`TripCleaner::builder()`] to create a cleaner with custom
/// configuration.
///
/// # Example
///
/// ```rust,ignore
/// use trip_cleaner::{CleanerConfig, StationReference, TripCleaner};
/// use chrono::NaiveDate;
///
/// let cleaner = TripCleaner::builder()
///     .config(
///         CleanerConfig::builder()
///             .end_date(NaiveDate::from_ymd_opt(2022, 8, 31).unwrap())
///             .build()?,
///     )
///     .build()?;
///
/// let reference = StationReference::new(stations_df)?;
/// let batch = cleaner.run(trips_df, &reference)?;
/// println!("{} rows kept", batch.report.rows_after);
/// ```
pub struct TripCleaner {
    config: CleanerConfig,
}

// The cleaner runs inside worker threads when batches are processed in
// parallel, so it must be movable across threads.
static_assertions::assert_impl_all!(TripCleaner: Send);

impl TripCleaner {
    /// Create a new cleaner builder.
    pub fn builder() -> TripCleanerBuilder {
        TripCleanerBuilder::default()
    }

    /// Create a cleaner from a validated configuration.
    pub fn new(config: CleanerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The cleaner's configuration.
    pub fn config(&self) -> &CleanerConfig {
        &self.config
    }

    /// Run the full cleaning pipeline over a trip batch.
    ///
    /// Data-quality anomalies (missing coordinates, unlisted stations,
    /// out-of-window or implausible rides) are filtered and counted in the
    /// report. Structural problems (schema violations, duplicate ride ids,
    /// unknown category labels) abort the run; there is no partial output.
    pub fn run(&self, df: DataFrame, reference: &StationReference) -> Result<CleanedBatch> {
        match self.run_internal(df, reference) {
            Ok(batch) => {
                info!(
                    rows_before = batch.report.rows_before,
                    rows_after = batch.report.rows_after,
                    removed_pct = format!("{:.1}", batch.report.rows_removed_percentage()),
                    "cleaning run complete"
                );
                Ok(batch)
            }
            Err(e) => {
                error!(code = e.error_code(), "cleaning run failed: {}", e);
                Err(e)
            }
        }
    }

    fn run_internal(&self, df: DataFrame, reference: &StationReference) -> Result<CleanedBatch> {
        let started = Instant::now();
        info!(rows = df.height(), "starting cleaning run");

        // Stage 0: structural validation. Fatal on failure.
        validate_trip_schema(&df)?;
        validate_ride_id_uniqueness(&df)?;

        let mut report = CleaningReport::new(df.height(), &self.config);

        // Stage 1: end-coordinate completeness.
        let (df, stage) = drop_missing_end_coords(df)?;
        self.log_stage(&stage);
        report.push_stage(stage);

        // Stage 2: operational-station filter.
        let (df, stage, unlisted) = drop_unlisted_stations(df, reference)?;
        self.log_stage(&stage);
        report.push_stage(stage);
        report.unlisted_stations = unlisted;

        // Stage 3: collection window.
        let (df, stage) = enforce_window(df, self.config.effective_window_cutoff())?;
        self.log_stage(&stage);
        report.push_stage(stage);

        // Stage 4: canonical coordinates.
        let (df, stage) = resolve_coordinates(df, reference)?;
        self.log_stage(&stage);
        report.push_stage(stage);

        // Stage 5: derived fields.
        let (df, stage) = add_derived_fields(df)?;
        self.log_stage(&stage);
        report.push_stage(stage);

        // Stage 6: DST fall-back repair.
        let (df, stage, repaired) =
            repair_dst_fallback(df, self.config.effective_dst_fallback_date())?;
        self.log_stage(&stage);
        report.push_stage(stage);
        report.dst_repaired_rows = repaired;

        // Stage 7: duration bounds.
        let (df, stage) = enforce_duration_bounds(
            df,
            self.config.min_duration_seconds,
            self.config.max_duration_seconds,
        )?;
        self.log_stage(&stage);
        report.push_stage(stage);

        // Stage 8: category recode. Fatal on unknown labels.
        let (df, stage) = recode_categories(df)?;
        self.log_stage(&stage);
        report.push_stage(stage);

        report.duration_ms = started.elapsed().as_millis() as u64;

        if report.rows_removed_percentage() > HIGH_LOSS_WARNING_THRESHOLD {
            let message = format!(
                "High data loss: {:.1}% of rows were removed",
                report.rows_removed_percentage()
            );
            warn!("{}", message);
            report.add_warning(message);
        }

        Ok(CleanedBatch { data: df, report })
    }

    fn log_stage(&self, stage: &crate::report::StageReport) {
        if stage.skipped {
            info!(stage = stage.stage.display_name(), "stage skipped");
        } else {
            info!(
                stage = stage.stage.display_name(),
                rows_removed = stage.rows_removed,
                rows_after = stage.rows_after,
                "stage complete"
            );
        }
    }
}

/// Builder for creating a [`TripCleaner`] instance.
#[derive(Default)]
pub struct TripCleanerBuilder {
    config: Option<CleanerConfig>,
}

static_assertions::assert_impl_all!(TripCleanerBuilder: Send);

impl TripCleanerBuilder {
    /// Set the cleaner configuration.
    pub fn config(mut self, config: CleanerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the cleaner.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<TripCleaner> {
        TripCleaner::new(self.config.unwrap_or_default())
    }
}
