//! Configuration for the trip-cleaning pipeline.
//!
//! Uses the builder pattern for ergonomic setup, with validation at build
//! time. All thresholds the cleaning stages consume live here; the stages
//! themselves carry no policy.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default minimum ride duration in seconds (operator-enforced floor).
pub const DEFAULT_MIN_DURATION_SECONDS: i64 = 60;

/// Default maximum ride duration in seconds (24-hour-theft threshold,
/// slightly under a full day).
pub const DEFAULT_MAX_DURATION_SECONDS: i64 = 86_000;

/// Default civil timezone used to interpret naive trip timestamps.
pub const DEFAULT_TIMEZONE: &str = "America/Chicago";

/// Configuration for a cleaning run.
///
/// Use [`CleanerConfig::builder()`] to create a configuration with a fluent
/// API.
///
/// # Example
///
/// ```rust,ignore
/// use trip_cleaner::CleanerConfig;
/// use chrono::NaiveDate;
///
/// let config = CleanerConfig::builder()
///     .end_date(NaiveDate::from_ymd_opt(2022, 8, 31).unwrap())
///     .min_duration_seconds(60)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanerConfig {
    /// First month of the expected input batch (inclusive).
    pub start_date: Option<NaiveDate>,

    /// Last day of the expected input batch (inclusive). When no explicit
    /// `window_cutoff` is set, the cutoff defaults to midnight after this
    /// date.
    pub end_date: Option<NaiveDate>,

    /// Timestamp after which `ended_at` disqualifies a record. Overrides
    /// the `end_date`-derived default.
    pub window_cutoff: Option<NaiveDateTime>,

    /// Lower duration bound; records with `duration_sec <= min` are dropped.
    /// Default: 60.
    pub min_duration_seconds: i64,

    /// Upper duration bound; records with `duration_sec >= max` are dropped.
    /// Default: 86000 (~23.9 h).
    pub max_duration_seconds: i64,

    /// Date of the fall-back DST transition on which negative durations are
    /// repaired by +1 h. When unset, inferred from `timezone` and the window
    /// year.
    pub dst_fallback_date: Option<NaiveDate>,

    /// Civil timezone used to interpret the naive timestamps.
    /// Default: "America/Chicago".
    pub timezone: String,

    /// Output directory for the cleaned table and report.
    /// Default: "outputs".
    pub output_dir: PathBuf,

    /// Custom output file name (without extension).
    /// If None, "cleaned_trips" is used.
    pub output_name: Option<String>,

    /// Whether the cleaned table is written to disk after a run.
    /// Default: true.
    pub save_to_disk: bool,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            window_cutoff: None,
            min_duration_seconds: DEFAULT_MIN_DURATION_SECONDS,
            max_duration_seconds: DEFAULT_MAX_DURATION_SECONDS,
            dst_fallback_date: None,
            timezone: DEFAULT_TIMEZONE.to_string(),
            output_dir: PathBuf::from("outputs"),
            output_name: None,
            save_to_disk: true,
        }
    }
}

impl CleanerConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CleanerConfigBuilder {
        CleanerConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(ConfigValidationError::InvalidDateRange { start, end });
            }
        }

        if self.min_duration_seconds >= self.max_duration_seconds {
            return Err(ConfigValidationError::InvalidDurationBounds {
                min: self.min_duration_seconds,
                max: self.max_duration_seconds,
            });
        }

        self.tz()?;

        Ok(())
    }

    /// Parsed civil timezone.
    pub fn tz(&self) -> Result<Tz, ConfigValidationError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigValidationError::UnknownTimezone(self.timezone.clone()))
    }

    /// The window cutoff to enforce: the explicit `window_cutoff` when set,
    /// otherwise midnight after `end_date`. None disables the window filter.
    pub fn effective_window_cutoff(&self) -> Option<NaiveDateTime> {
        self.window_cutoff.or_else(|| {
            self.end_date
                .and_then(|d| d.checked_add_days(Days::new(1)))
                .map(|d| d.and_time(NaiveTime::MIN))
        })
    }

    /// The fall-back transition date to repair: the configured date when
    /// set, otherwise inferred from the timezone and the window year.
    /// None disables the repair (negative durations are then removed by the
    /// duration filter).
    pub fn effective_dst_fallback_date(&self) -> Option<NaiveDate> {
        if self.dst_fallback_date.is_some() {
            return self.dst_fallback_date;
        }
        let year = self
            .effective_window_cutoff()
            .map(|c| c.date().year())
            .or_else(|| self.end_date.map(|d| d.year()))?;
        let tz = self.tz().ok()?;
        infer_fallback_date(tz, year)
    }
}

/// Find the one day of `year` on which local clocks in `tz` repeat an hour.
///
/// A day qualifies when some early-morning wall-clock time maps to two UTC
/// instants. Returns None for zones without DST.
pub fn infer_fallback_date(tz: Tz, year: i32) -> Option<NaiveDate> {
    let mut day = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let probe = NaiveTime::from_hms_opt(1, 30, 0)?;
    while day.year() == year {
        let local = day.and_time(probe);
        if let chrono::LocalResult::Ambiguous(_, _) = tz.from_local_datetime(&local) {
            return Some(day);
        }
        day = day.checked_add_days(Days::new(1))?;
    }
    None
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Invalid duration bounds: min {min} must be below max {max}")]
    InvalidDurationBounds { min: i64, max: i64 },

    #[error("Unknown timezone: '{0}'")]
    UnknownTimezone(String),
}

/// Builder for [`CleanerConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct CleanerConfigBuilder {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    window_cutoff: Option<NaiveDateTime>,
    min_duration_seconds: Option<i64>,
    max_duration_seconds: Option<i64>,
    dst_fallback_date: Option<NaiveDate>,
    timezone: Option<String>,
    output_dir: Option<PathBuf>,
    output_name: Option<String>,
    save_to_disk: Option<bool>,
}

impl CleanerConfigBuilder {
    /// Set the first month of the expected batch.
    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    /// Set the last day of the expected batch (inclusive).
    pub fn end_date(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    /// Set an explicit window cutoff timestamp.
    ///
    /// Records whose `ended_at` falls after this instant are removed.
    pub fn window_cutoff(mut self, cutoff: NaiveDateTime) -> Self {
        self.window_cutoff = Some(cutoff);
        self
    }

    /// Set the minimum ride duration in seconds.
    pub fn min_duration_seconds(mut self, seconds: i64) -> Self {
        self.min_duration_seconds = Some(seconds);
        self
    }

    /// Set the maximum ride duration in seconds.
    pub fn max_duration_seconds(mut self, seconds: i64) -> Self {
        self.max_duration_seconds = Some(seconds);
        self
    }

    /// Set the fall-back DST date on which the +1 h repair applies.
    pub fn dst_fallback_date(mut self, date: NaiveDate) -> Self {
        self.dst_fallback_date = Some(date);
        self
    }

    /// Set the civil timezone used to interpret naive timestamps.
    pub fn timezone(mut self, tz: impl Into<String>) -> Self {
        self.timezone = Some(tz.into());
        self
    }

    /// Set the output directory for the cleaned table and report.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set a custom output file name (without extension).
    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    /// Control whether the cleaned table is written to disk.
    pub fn save_to_disk(mut self, save: bool) -> Self {
        self.save_to_disk = Some(save);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `CleanerConfig` or an error if validation fails.
    pub fn build(self) -> Result<CleanerConfig, ConfigValidationError> {
        let config = CleanerConfig {
            start_date: self.start_date,
            end_date: self.end_date,
            window_cutoff: self.window_cutoff,
            min_duration_seconds: self
                .min_duration_seconds
                .unwrap_or(DEFAULT_MIN_DURATION_SECONDS),
            max_duration_seconds: self
                .max_duration_seconds
                .unwrap_or(DEFAULT_MAX_DURATION_SECONDS),
            dst_fallback_date: self.dst_fallback_date,
            timezone: self.timezone.unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from("outputs")),
            output_name: self.output_name,
            save_to_disk: self.save_to_disk.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}
