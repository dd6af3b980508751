//! Stage 5 and 6: derived analysis fields and the DST fall-back repair.

use crate::error::Result;
use crate::report::{Stage, StageReport};
use crate::schema::{DAY_OF_MONTH, DURATION_SEC, ENDED_AT, HOUR, MONTH, STARTED_AT, WEEKDAY};
use crate::utils::eval_mask;
use chrono::{Days, NaiveDate, NaiveTime};
use polars::prelude::*;
use tracing::{debug, info};

/// Stage 5: add the derived analysis columns.
///
/// `duration_sec` is the elapsed seconds between start and end; `month` is
/// the start timestamp truncated to the first of its month; `hour`,
/// `weekday` (1 = Monday) and `day_of_month` slice the start timestamp for
/// grouping. Existing columns with these names are overwritten, so re-runs
/// recompute rather than duplicate.
pub fn add_derived_fields(df: DataFrame) -> Result<(DataFrame, StageReport)> {
    let rows = df.height();
    let out = df
        .lazy()
        .with_columns([
            (col(ENDED_AT) - col(STARTED_AT))
                .dt()
                .total_seconds()
                .cast(DataType::Int64)
                .alias(DURATION_SEC),
            col(STARTED_AT)
                .dt()
                .truncate(lit("1mo"))
                .cast(DataType::Date)
                .alias(MONTH),
            col(STARTED_AT).dt().hour().cast(DataType::Int8).alias(HOUR),
            col(STARTED_AT)
                .dt()
                .weekday()
                .cast(DataType::Int8)
                .alias(WEEKDAY),
            col(STARTED_AT)
                .dt()
                .day()
                .cast(DataType::Int8)
                .alias(DAY_OF_MONTH),
        ])
        .collect()?;

    debug!(rows, "derived duration and calendar fields");

    Ok((out, StageReport::transformed(Stage::DerivedFields, rows)))
}

/// Stage 6: repair negative durations caused by the fall-back DST shift.
///
/// On the fall-back date local clocks rewind an hour, so a short ride
/// spanning the transition gets a negative naive duration. Those rides (and
/// only those: negative duration, started on the transition date) get one
/// hour added back. Negative durations on any other day are left for the
/// duration filter to remove. With no transition date available the stage
/// is a recorded no-op.
pub fn repair_dst_fallback(
    df: DataFrame,
    fallback_date: Option<NaiveDate>,
) -> Result<(DataFrame, StageReport, usize)> {
    let Some(date) = fallback_date else {
        let rows = df.height();
        return Ok((
            df,
            StageReport::skipped(Stage::DstRepair, rows, "no fall-back date available"),
            0,
        ));
    };

    let day_start = date.and_time(NaiveTime::MIN);
    let day_end = date
        .checked_add_days(Days::new(1))
        .map(|d| d.and_time(NaiveTime::MIN))
        .unwrap_or(day_start);

    let affected = col(DURATION_SEC)
        .lt(lit(0i64))
        .and(col(STARTED_AT).gt_eq(lit(day_start)))
        .and(col(STARTED_AT).lt(lit(day_end)));

    let mask = eval_mask(&df, affected.clone())?;
    let repaired: usize = mask.into_iter().flatten().filter(|v| *v).count();

    let rows = df.height();
    if repaired == 0 {
        return Ok((
            df,
            StageReport::transformed(Stage::DstRepair, rows).with_note("no rides affected"),
            0,
        ));
    }

    let out = df
        .lazy()
        .with_column(
            when(affected)
                .then(col(DURATION_SEC) + lit(3600i64))
                .otherwise(col(DURATION_SEC))
                .alias(DURATION_SEC),
        )
        .collect()?;

    info!(repaired, %date, "repaired fall-back DST durations");

    Ok((
        out,
        StageReport::transformed(Stage::DstRepair, rows)
            .with_note(format!("{} durations repaired (+3600 s)", repaired)),
        repaired,
    ))
}
