//! Stage 4: canonical coordinate resolution.
//!
//! Raw GPS fixes are noisy (a docked bike reports wherever its radio last
//! woke up), so whenever a ride touches a named station the reference
//! coordinates for that station replace the raw ones. Dockless rides keep
//! their raw fix.

use crate::error::Result;
use crate::reference::StationReference;
use crate::report::{Stage, StageReport};
use crate::schema::{
    has_column, END_LAT, END_LNG, END_STATION_NAME, LATITUDE, LONGITUDE, RIDE_ID, START_LAT,
    START_LNG, START_STATION_NAME, STATION_NAME,
};
use crate::utils::{first_occurrence_mask, str_column};
use polars::prelude::*;
use tracing::{debug, warn};

const RAW_COORD_COLUMNS: &[&str] = &[START_LAT, START_LNG, END_LAT, END_LNG];

/// Replace raw coordinates with reference coordinates wherever the ride
/// touches a named station.
///
/// Per side (start, end): a left join on the station name pulls in the
/// reference pair, which overrides the raw column wherever it matched.
/// Null station names never match, so their raw fix survives. Reference rows repeated across re-activations can fan the
/// join out; the batch is deduplicated back to one row per `ride_id`
/// afterwards (first occurrence wins, coordinates are identical by
/// construction).
///
/// Skipped when the batch carries no raw coordinate columns at all.
pub fn resolve_coordinates(
    df: DataFrame,
    reference: &StationReference,
) -> Result<(DataFrame, StageReport)> {
    if RAW_COORD_COLUMNS.iter().any(|c| !has_column(&df, c)) {
        let rows = df.height();
        return Ok((
            df,
            StageReport::skipped(Stage::CoordinateResolution, rows, "raw coordinates absent"),
        ));
    }

    let rows_before = df.height();
    let coords = reference.coordinates()?;

    let (df, start_overrides) =
        resolve_side(df, &coords, START_STATION_NAME, START_LAT, START_LNG)?;
    let (df, end_overrides) = resolve_side(df, &coords, END_STATION_NAME, END_LAT, END_LNG)?;

    // The joins can only add rows, never remove them; anything beyond one
    // row per ride is join fan-out from repeated reference entries.
    let ids = str_column(&df, RIDE_ID)?;
    let first = first_occurrence_mask(&ids);
    let deduped = df.filter(&first)?;

    let fanned_out = df.height().saturating_sub(rows_before);
    if fanned_out > 0 {
        warn!(
            fanned_out,
            "collapsed join fan-out from repeated reference entries"
        );
    }

    debug!(
        start_overrides,
        end_overrides,
        rows = deduped.height(),
        "resolved station coordinates"
    );

    let report = StageReport::filtered(
        Stage::CoordinateResolution,
        rows_before,
        deduped.height(),
        Vec::new(),
    )
    .with_note(format!(
        "{} start and {} end coordinates overridden",
        start_overrides, end_overrides
    ));

    Ok((deduped, report))
}

/// Join one side's station name against the reference and fold the
/// reference pair into the raw coordinate columns.
fn resolve_side(
    df: DataFrame,
    coords: &DataFrame,
    station_col: &str,
    lat_col: &str,
    lng_col: &str,
) -> Result<(DataFrame, usize)> {
    let joined = df
        .lazy()
        .join(
            coords.clone().lazy(),
            [col(station_col)],
            [col(STATION_NAME)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;

    let overrides = joined.height() - joined.column(LATITUDE)?.null_count();

    let mut resolved = joined
        .lazy()
        .with_columns([
            col(LATITUDE).fill_null(col(lat_col)).alias(lat_col),
            col(LONGITUDE).fill_null(col(lng_col)).alias(lng_col),
        ])
        .collect()?;

    resolved = resolved.drop_many([PlSmallStr::from(LATITUDE), PlSmallStr::from(LONGITUDE)]);

    Ok((resolved, overrides))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MEMBER_CASUAL, RIDEABLE_TYPE};

    fn reference() -> StationReference {
        let df = df!(
            STATION_NAME => &["Clark St", "State St"],
            LATITUDE => &[41.90, 41.80],
            LONGITUDE => &[-87.63, -87.62],
        )
        .unwrap();
        StationReference::new(df).unwrap()
    }

    fn batch() -> DataFrame {
        df!(
            RIDE_ID => &["A", "B", "C"],
            RIDEABLE_TYPE => &["classic_bike", "electric_bike", "electric_bike"],
            START_STATION_NAME => &[Some("Clark St"), Some("State St"), None],
            END_STATION_NAME => &[Some("State St"), None, None],
            START_LAT => &[Some(41.11), Some(41.22), Some(41.33)],
            START_LNG => &[Some(-87.11), Some(-87.22), Some(-87.33)],
            END_LAT => &[Some(41.44), Some(41.55), Some(41.66)],
            END_LNG => &[Some(-87.44), Some(-87.55), Some(-87.66)],
            MEMBER_CASUAL => &["member", "casual", "member"],
        )
        .unwrap()
    }

    fn f64_at(df: &DataFrame, col: &str, row: usize) -> f64 {
        df.column(col)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .get(row)
            .unwrap()
    }

    #[test]
    fn test_reference_coordinates_take_precedence() {
        let (out, report) = resolve_coordinates(batch(), &reference()).unwrap();

        assert_eq!(out.height(), 3);
        assert!(!report.skipped);
        // Ride A: both ends named, both overridden.
        assert_eq!(f64_at(&out, START_LAT, 0), 41.90);
        assert_eq!(f64_at(&out, START_LNG, 0), -87.63);
        assert_eq!(f64_at(&out, END_LAT, 0), 41.80);
        // Ride B: named start overridden, anonymous end keeps raw GPS.
        assert_eq!(f64_at(&out, START_LAT, 1), 41.80);
        assert_eq!(f64_at(&out, END_LAT, 1), 41.55);
        // Ride C: fully dockless, raw GPS untouched.
        assert_eq!(f64_at(&out, START_LAT, 2), 41.33);
        assert_eq!(f64_at(&out, END_LAT, 2), 41.66);
    }

    #[test]
    fn test_repeated_reference_rows_do_not_duplicate_rides() {
        let df = df!(
            STATION_NAME => &["Clark St", "Clark St"],
            LATITUDE => &[41.90, 41.90],
            LONGITUDE => &[-87.63, -87.63],
        )
        .unwrap();
        let reference = StationReference::new(df).unwrap();

        let (out, report) = resolve_coordinates(batch(), &reference).unwrap();

        assert_eq!(out.height(), 3);
        let ids = str_column(&out, RIDE_ID).unwrap();
        let ids: Vec<&str> = ids.into_iter().flatten().collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(report.rows_after, 3);
    }

    #[test]
    fn test_skipped_without_raw_coordinates() {
        let df = batch()
            .drop_many([
                PlSmallStr::from(START_LAT),
                PlSmallStr::from(START_LNG),
                PlSmallStr::from(END_LAT),
                PlSmallStr::from(END_LNG),
            ]);

        let (out, report) = resolve_coordinates(df, &reference()).unwrap();
        assert_eq!(out.height(), 3);
        assert!(report.skipped);
    }
}
