//! CLI entry point for the trip-cleaning pipeline.

use anyhow::{anyhow, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::Parser;
use polars::prelude::*;
use std::path::PathBuf;
use tracing::{error, info};
use trip_cleaner::{
    CleanerConfig, CleaningReport, OutputWriter, StationReference, TripCleaner,
};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Bike-share trip data cleaner",
    long_about = "Cleans raw bike-share trip exports into an analysis-ready table.\n\n\
                  EXAMPLES:\n  \
                  # Clean one month against the station reference\n  \
                  trip-cleaner -t 202208-trips.csv -s stations.csv --end-date 2022-08-31\n\n  \
                  # Clean a whole year of monthly exports\n  \
                  trip-cleaner -t exports/2022*.csv -s stations.csv --end-date 2022-12-31\n\n  \
                  # Machine-readable report on stdout\n  \
                  trip-cleaner -t 202208-trips.csv -s stations.csv --json"
)]
struct Args {
    /// Trip CSV file(s) to clean; multiple files are stacked into one batch
    #[arg(short = 't', long = "trips", required = true, num_args = 1..)]
    trips: Vec<PathBuf>,

    /// Station reference CSV (station_name, latitude, longitude)
    #[arg(short = 's', long)]
    stations: PathBuf,

    /// Output directory for results
    #[arg(short, long, default_value = "./outputs")]
    output: PathBuf,

    /// Custom output file name (without extension)
    ///
    /// If not specified, uses "cleaned_trips"
    #[arg(long)]
    output_name: Option<String>,

    /// First month of the expected batch (YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Last day of the expected batch, inclusive (YYYY-MM-DD)
    ///
    /// Rides ending after midnight following this date are removed
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Explicit window cutoff (YYYY-MM-DDTHH:MM:SS); overrides --end-date
    #[arg(long)]
    window_cutoff: Option<NaiveDateTime>,

    /// Minimum ride duration in seconds (exclusive)
    #[arg(long, default_value_t = trip_cleaner::DEFAULT_MIN_DURATION_SECONDS)]
    min_duration: i64,

    /// Maximum ride duration in seconds (exclusive)
    #[arg(long, default_value_t = trip_cleaner::DEFAULT_MAX_DURATION_SECONDS)]
    max_duration: i64,

    /// Fall-back DST date (YYYY-MM-DD); inferred from the timezone if unset
    #[arg(long)]
    dst_fallback_date: Option<NaiveDate>,

    /// Civil timezone the naive timestamps are recorded in
    #[arg(long, default_value = trip_cleaner::DEFAULT_TIMEZONE)]
    timezone: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and errors)
    #[arg(short, long)]
    quiet: bool,

    /// Output the JSON report to stdout instead of a human-readable summary
    ///
    /// Disables all progress logs; only the report is written to stdout.
    /// Useful for piping to other tools: `... --json | jq .rows_removed`
    #[arg(long)]
    json: bool,

    /// Write the JSON report next to the cleaned data
    #[arg(short = 'r', long)]
    emit_report: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    for path in args.trips.iter().chain(std::iter::once(&args.stations)) {
        if !path.exists() {
            return Err(anyhow!("Input file not found: {}", path.display()));
        }
    }

    info!("Loading station reference from: {}", args.stations.display());
    let reference = StationReference::new(load_csv(&args.stations)?)
        .map_err(|e| anyhow!("Invalid station reference: {}", e))?;
    info!("Station reference loaded: {} rows", reference.len());

    let trips = load_trip_batch(&args.trips)?;
    info!("Trip batch loaded: {:?}", trips.shape());

    let mut config_builder = CleanerConfig::builder()
        .min_duration_seconds(args.min_duration)
        .max_duration_seconds(args.max_duration)
        .timezone(&args.timezone)
        .output_dir(&args.output);

    if let Some(date) = args.start_date {
        config_builder = config_builder.start_date(date);
    }
    if let Some(date) = args.end_date {
        config_builder = config_builder.end_date(date);
    }
    if let Some(cutoff) = args.window_cutoff {
        config_builder = config_builder.window_cutoff(cutoff);
    }
    if let Some(date) = args.dst_fallback_date {
        config_builder = config_builder.dst_fallback_date(date);
    }
    if let Some(ref name) = args.output_name {
        config_builder = config_builder.output_name(name);
    }

    let config = config_builder.build()?;
    let cleaner = TripCleaner::builder().config(config).build()?;

    let mut batch = match cleaner.run(trips, &reference) {
        Ok(batch) => batch,
        Err(e) => {
            error!("Cleaning failed: {}", e);
            return Err(anyhow!("Cleaning failed [{}]: {}", e.error_code(), e));
        }
    };

    let writer = OutputWriter::new(args.output.clone(), args.output_name.clone());
    let data_path = if cleaner.config().save_to_disk {
        Some(writer.write_data(&mut batch.data)?)
    } else {
        None
    };

    if args.emit_report {
        writer.write_report(&batch.report)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&batch.report)?);
        return Ok(());
    }

    print_summary(&batch.report, data_path.as_deref());

    Ok(())
}

/// Load one CSV with header and date parsing enabled.
fn load_csv(path: &PathBuf) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .with_parse_options(CsvParseOptions::default().with_try_parse_dates(true))
        .try_into_reader_with_file_path(Some(path.clone()))?
        .finish()
        .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))
}

/// Load and stack all trip CSVs into a single batch.
fn load_trip_batch(paths: &[PathBuf]) -> Result<DataFrame> {
    let mut batch: Option<DataFrame> = None;
    for path in paths {
        info!("Loading trips from: {}", path.display());
        let df = load_csv(path)?;
        batch = Some(match batch {
            Some(acc) => acc
                .vstack(&df)
                .map_err(|e| anyhow!("Failed to stack {}: {}", path.display(), e))?,
            None => df,
        });
    }
    batch.ok_or_else(|| anyhow!("No trip files given"))
}

/// Print a human-readable summary of the cleaning run.
///
/// Uses `println!` intentionally for user-facing CLI output; unlike logging
/// this should always be visible regardless of log level settings.
fn print_summary(report: &CleaningReport, data_path: Option<&std::path::Path>) {
    println!();
    println!("{}", "=".repeat(72));
    println!("CLEANING COMPLETE");
    println!("{}", "=".repeat(72));
    println!();
    if let Some(path) = data_path {
        println!("Output: {}", path.display());
    }
    println!(
        "Rows: {} -> {} ({} removed, {:.1}%)",
        report.rows_before,
        report.rows_after,
        report.rows_removed,
        report.rows_removed_percentage()
    );
    println!("Duration: {}ms", report.duration_ms);
    println!();

    println!("{:<34} {:>10} {:>10} {:>9}", "Stage", "Before", "After", "Removed");
    println!("{}", "-".repeat(66));
    for stage in &report.stages {
        if stage.skipped {
            println!("{:<34} {:>31}", stage.stage.display_name(), "(skipped)");
        } else {
            println!(
                "{:<34} {:>10} {:>10} {:>9}",
                stage.stage.display_name(),
                stage.rows_before,
                stage.rows_after,
                stage.rows_removed
            );
        }
    }
    println!();

    if !report.unlisted_stations.is_empty() {
        println!("Unlisted stations:");
        for (name, count) in &report.unlisted_stations {
            println!("  {:>6}  {}", count, name);
        }
        println!();
    }

    if report.dst_repaired_rows > 0 {
        println!("DST repairs: {} durations corrected (+1 h)", report.dst_repaired_rows);
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings:");
        for warning in &report.warnings {
            println!("  ! {}", warning);
        }
        println!();
    }

    println!("Use --json for machine-readable output");
    println!("Use --emit-report to save the JSON report");
    println!("{}", "=".repeat(72));
}
