//! Audit report types for a cleaning run.
//!
//! The report is derived, never consumed downstream: it exists so the
//! narrative analysis can verify what each rule removed or adjusted.

use crate::config::CleanerConfig;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How many removed ride ids a stage report retains as a sample.
pub const REMOVED_ID_SAMPLE_LIMIT: usize = 20;

/// A stage of the cleaning pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    EndCoordinates,
    UnlistedStations,
    Window,
    CoordinateResolution,
    DerivedFields,
    DstRepair,
    DurationBounds,
    Recode,
}

impl Stage {
    /// Human-readable stage name for logs and summaries.
    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::EndCoordinates => "End-coordinate completeness filter",
            Stage::UnlistedStations => "Operational-station filter",
            Stage::Window => "Window filter",
            Stage::CoordinateResolution => "Coordinate resolution",
            Stage::DerivedFields => "Derived fields",
            Stage::DstRepair => "DST fall-back repair",
            Stage::DurationBounds => "Implausible-duration filter",
            Stage::Recode => "Category recode",
        }
    }
}

/// What a single stage did to the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub rows_before: usize,
    pub rows_after: usize,
    pub rows_removed: usize,
    /// True when the stage had nothing to act on (e.g. raw coordinate
    /// columns absent on a re-run) and passed the batch through untouched.
    pub skipped: bool,
    /// First few ride ids removed by this stage, for spot checks.
    pub removed_sample: Vec<String>,
    /// Free-form stage annotations (override counts, skip reasons).
    pub notes: Vec<String>,
}

impl StageReport {
    /// Report for a stage that filtered rows.
    pub fn filtered(
        stage: Stage,
        rows_before: usize,
        rows_after: usize,
        removed_sample: Vec<String>,
    ) -> Self {
        Self {
            stage,
            rows_before,
            rows_after,
            rows_removed: rows_before.saturating_sub(rows_after),
            skipped: false,
            removed_sample,
            notes: Vec::new(),
        }
    }

    /// Report for a stage that transformed columns without removing rows.
    pub fn transformed(stage: Stage, rows: usize) -> Self {
        Self::filtered(stage, rows, rows, Vec::new())
    }

    /// Report for a stage that was a recorded no-op.
    pub fn skipped(stage: Stage, rows: usize, reason: impl Into<String>) -> Self {
        let mut report = Self::transformed(stage, rows);
        report.skipped = true;
        report.notes.push(reason.into());
        report
    }

    /// Attach an annotation.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// Configuration values echoed into the report so a reader can interpret
/// the counts without the original invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEcho {
    pub timezone: String,
    pub window_cutoff: Option<NaiveDateTime>,
    pub dst_fallback_date: Option<NaiveDate>,
    pub min_duration_seconds: i64,
    pub max_duration_seconds: i64,
}

/// Full audit report for one cleaning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningReport {
    /// Timestamp when the report was generated.
    pub generated_at: String,
    pub rows_before: usize,
    pub rows_after: usize,
    pub rows_removed: usize,
    /// Per-stage breakdown, in execution order.
    pub stages: Vec<StageReport>,
    /// Station names seen in trip data but absent from the reference,
    /// with occurrence counts.
    pub unlisted_stations: BTreeMap<String, u32>,
    /// Rows whose negative duration was repaired by the DST rule.
    pub dst_repaired_rows: usize,
    /// Wall-clock run duration.
    pub duration_ms: u64,
    pub warnings: Vec<String>,
    pub config: ConfigEcho,
}

impl CleaningReport {
    pub fn new(rows_before: usize, config: &CleanerConfig) -> Self {
        Self {
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            rows_before,
            rows_after: rows_before,
            rows_removed: 0,
            stages: Vec::new(),
            unlisted_stations: BTreeMap::new(),
            dst_repaired_rows: 0,
            duration_ms: 0,
            warnings: Vec::new(),
            config: ConfigEcho {
                timezone: config.timezone.clone(),
                window_cutoff: config.effective_window_cutoff(),
                dst_fallback_date: config.effective_dst_fallback_date(),
                min_duration_seconds: config.min_duration_seconds,
                max_duration_seconds: config.max_duration_seconds,
            },
        }
    }

    /// Record a finished stage and roll its counts into the totals.
    pub fn push_stage(&mut self, stage: StageReport) {
        self.rows_after = stage.rows_after;
        self.rows_removed = self.rows_before.saturating_sub(self.rows_after);
        self.stages.push(stage);
    }

    /// Percentage of input rows removed across the whole run.
    pub fn rows_removed_percentage(&self) -> f64 {
        if self.rows_before == 0 {
            0.0
        } else {
            self.rows_removed as f64 / self.rows_before as f64 * 100.0
        }
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}
