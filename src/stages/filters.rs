//! Row-filtering stages: end-coordinate completeness, operational stations,
//! collection window, and duration bounds.

use crate::error::Result;
use crate::reference::StationReference;
use crate::report::{Stage, StageReport, REMOVED_ID_SAMPLE_LIMIT};
use crate::schema::{
    has_column, DURATION_SEC, ENDED_AT, END_LAT, END_LNG, END_STATION_NAME, START_STATION_NAME,
};
use crate::utils::{eval_mask, sample_ride_ids, split_on_mask, str_column};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

/// Stage 1: remove records with no terminal location at all.
///
/// A ride whose `end_lat` and `end_lng` are both null never had its end
/// recorded anywhere (no station, no GPS) and is treated as an
/// abandoned/stolen bike. Batches lacking the raw coordinate columns are
/// passed through untouched.
pub fn drop_missing_end_coords(df: DataFrame) -> Result<(DataFrame, StageReport)> {
    if !has_column(&df, END_LAT) || !has_column(&df, END_LNG) {
        let rows = df.height();
        return Ok((
            df,
            StageReport::skipped(Stage::EndCoordinates, rows, "raw end coordinates absent"),
        ));
    }

    let lat_null = df.column(END_LAT)?.as_materialized_series().is_null();
    let lng_null = df.column(END_LNG)?.as_materialized_series().is_null();
    let both_null = &lat_null & &lng_null;
    let keep = !&both_null;

    let rows_before = df.height();
    let (kept, removed) = split_on_mask(&df, &keep)?;
    let sample = sample_ride_ids(&removed, REMOVED_ID_SAMPLE_LIMIT)?;

    debug!(
        removed = removed.height(),
        "dropped records with no end coordinates"
    );

    let rows_after = kept.height();
    Ok((
        kept,
        StageReport::filtered(Stage::EndCoordinates, rows_before, rows_after, sample),
    ))
}

/// Stage 2: remove records touching stations absent from the reference.
///
/// Names seen in trip data but not in the active registry belong to test or
/// charging infrastructure; every occurrence is censused for the report.
/// Null station names (anonymized docks) are not unlisted.
pub fn drop_unlisted_stations(
    df: DataFrame,
    reference: &StationReference,
) -> Result<(DataFrame, StageReport, BTreeMap<String, u32>)> {
    let active = reference.names()?;
    let starts = str_column(&df, START_STATION_NAME)?;
    let ends = str_column(&df, END_STATION_NAME)?;

    let mut unlisted: BTreeMap<String, u32> = BTreeMap::new();
    let mut flags: Vec<bool> = Vec::with_capacity(df.height());

    for (opt_start, opt_end) in starts.into_iter().zip(ends.into_iter()) {
        let mut keep = true;
        for opt_name in [opt_start, opt_end] {
            if let Some(name) = opt_name {
                if !active.contains(name) {
                    *unlisted.entry(name.to_string()).or_insert(0) += 1;
                    keep = false;
                }
            }
        }
        flags.push(keep);
    }

    let keep = BooleanChunked::from_slice("keep".into(), &flags);
    let rows_before = df.height();
    let (kept, removed) = split_on_mask(&df, &keep)?;
    let sample = sample_ride_ids(&removed, REMOVED_ID_SAMPLE_LIMIT)?;

    debug!(
        removed = removed.height(),
        unlisted_names = unlisted.len(),
        "dropped records at unlisted stations"
    );

    let report = StageReport::filtered(Stage::UnlistedStations, rows_before, kept.height(), sample)
        .with_note(format!("{} unlisted station names", unlisted.len()));

    Ok((kept, report, unlisted))
}

/// Stage 3: remove records ending after the collection-window cutoff.
///
/// The cutoff policy (midnight vs. grace period) is the caller's; with no
/// cutoff configured the stage is a recorded no-op.
pub fn enforce_window(
    df: DataFrame,
    cutoff: Option<NaiveDateTime>,
) -> Result<(DataFrame, StageReport)> {
    let Some(cutoff) = cutoff else {
        let rows = df.height();
        return Ok((
            df,
            StageReport::skipped(Stage::Window, rows, "no window cutoff configured"),
        ));
    };

    let keep = eval_mask(&df, col(ENDED_AT).lt_eq(lit(cutoff)))?;
    let rows_before = df.height();
    let (kept, removed) = split_on_mask(&df, &keep)?;
    let sample = sample_ride_ids(&removed, REMOVED_ID_SAMPLE_LIMIT)?;

    debug!(removed = removed.height(), %cutoff, "dropped out-of-window records");

    let rows_after = kept.height();
    Ok((
        kept,
        StageReport::filtered(Stage::Window, rows_before, rows_after, sample)
            .with_note(format!("cutoff {}", cutoff)),
    ))
}

/// Stage 7: remove records with implausible durations.
///
/// Enforces the configured open interval `(min, max)`; anything at or below
/// the minimum (including the negative durations the DST repair could not
/// resolve) or at or above the maximum goes.
pub fn enforce_duration_bounds(
    df: DataFrame,
    min_seconds: i64,
    max_seconds: i64,
) -> Result<(DataFrame, StageReport)> {
    let keep = eval_mask(
        &df,
        col(DURATION_SEC)
            .gt(lit(min_seconds))
            .and(col(DURATION_SEC).lt(lit(max_seconds))),
    )?;

    let rows_before = df.height();
    let (kept, removed) = split_on_mask(&df, &keep)?;
    let sample = sample_ride_ids(&removed, REMOVED_ID_SAMPLE_LIMIT)?;

    debug!(
        removed = removed.height(),
        min_seconds, max_seconds, "dropped implausible durations"
    );

    let rows_after = kept.height();
    Ok((
        kept,
        StageReport::filtered(Stage::DurationBounds, rows_before, rows_after, sample),
    ))
}
