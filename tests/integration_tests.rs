//! End-to-end tests for the cleaning pipeline on in-memory batches.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use trip_cleaner::{CleanerConfig, OutputWriter, StationReference, TripCleaner};

const RIDE_ID: &str = "ride_id";
const RIDEABLE_TYPE: &str = "rideable_type";
const STARTED_AT: &str = "started_at";
const ENDED_AT: &str = "ended_at";
const START_STATION_NAME: &str = "start_station_name";
const END_STATION_NAME: &str = "end_station_name";
const START_LAT: &str = "start_lat";
const START_LNG: &str = "start_lng";
const END_LAT: &str = "end_lat";
const END_LNG: &str = "end_lng";
const MEMBER_CASUAL: &str = "member_casual";

fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

fn reference() -> StationReference {
    let df = df!(
        "station_name" => &["Clark St & Lake St", "State St & Harrison St", "Wells St & Elm St"],
        "latitude" => &[41.8858, 41.8740, 41.9029],
        "longitude" => &[-87.6308, -87.6277, -87.6345],
    )
    .unwrap();
    StationReference::new(df).unwrap()
}

fn august_cleaner() -> TripCleaner {
    TripCleaner::builder()
        .config(
            CleanerConfig::builder()
                .start_date(NaiveDate::from_ymd_opt(2022, 8, 1).unwrap())
                .end_date(NaiveDate::from_ymd_opt(2022, 8, 31).unwrap())
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

struct Ride {
    id: &'static str,
    bike: &'static str,
    started: NaiveDateTime,
    ended: NaiveDateTime,
    start_station: Option<&'static str>,
    end_station: Option<&'static str>,
    end_coords: Option<(f64, f64)>,
    user: &'static str,
}

impl Ride {
    fn ok(id: &'static str) -> Self {
        Self {
            id,
            bike: "classic_bike",
            started: ts(2022, 8, 10, 9, 0),
            ended: ts(2022, 8, 10, 9, 30),
            start_station: Some("Clark St & Lake St"),
            end_station: Some("State St & Harrison St"),
            end_coords: Some((41.87, -87.62)),
            user: "member",
        }
    }
}

fn batch(rides: Vec<Ride>) -> DataFrame {
    df!(
        RIDE_ID => rides.iter().map(|r| r.id).collect::<Vec<_>>(),
        RIDEABLE_TYPE => rides.iter().map(|r| r.bike).collect::<Vec<_>>(),
        STARTED_AT => rides.iter().map(|r| r.started).collect::<Vec<_>>(),
        ENDED_AT => rides.iter().map(|r| r.ended).collect::<Vec<_>>(),
        START_STATION_NAME => rides.iter().map(|r| r.start_station).collect::<Vec<_>>(),
        END_STATION_NAME => rides.iter().map(|r| r.end_station).collect::<Vec<_>>(),
        START_LAT => rides.iter().map(|_| Some(41.88)).collect::<Vec<_>>(),
        START_LNG => rides.iter().map(|_| Some(-87.63)).collect::<Vec<_>>(),
        END_LAT => rides.iter().map(|r| r.end_coords.map(|c| c.0)).collect::<Vec<_>>(),
        END_LNG => rides.iter().map(|r| r.end_coords.map(|c| c.1)).collect::<Vec<_>>(),
        MEMBER_CASUAL => rides.iter().map(|r| r.user).collect::<Vec<_>>(),
    )
    .unwrap()
}

fn kept_ids(df: &DataFrame) -> Vec<String> {
    df.column(RIDE_ID)
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap()
        .into_iter()
        .flatten()
        .map(|s| s.to_string())
        .collect()
}

fn i64_at(df: &DataFrame, name: &str, row: usize) -> i64 {
    df.column(name)
        .unwrap()
        .as_materialized_series()
        .i64()
        .unwrap()
        .get(row)
        .unwrap()
}

#[test]
fn removes_rides_without_end_coordinates() {
    let mut abandoned = Ride::ok("LOST");
    abandoned.end_station = None;
    abandoned.end_coords = None;

    let df = batch(vec![Ride::ok("OK1"), abandoned]);
    let out = august_cleaner().run(df, &reference()).unwrap();

    assert_eq!(kept_ids(&out.data), vec!["OK1".to_string()]);
    let stage = &out.report.stages[0];
    assert_eq!(stage.rows_removed, 1);
    assert_eq!(stage.removed_sample, vec!["LOST".to_string()]);
}

#[test]
fn censuses_unlisted_stations() {
    let mut test_ride = Ride::ok("TST");
    test_ride.end_station = Some("Testing - Charging");

    let df = batch(vec![Ride::ok("OK1"), test_ride]);
    let out = august_cleaner().run(df, &reference()).unwrap();

    assert_eq!(kept_ids(&out.data), vec!["OK1".to_string()]);
    assert_eq!(
        out.report.unlisted_stations.get("Testing - Charging"),
        Some(&1)
    );
}

#[test]
fn window_boundary_is_midnight_after_end_date() {
    let mut late_august = Ride::ok("AUG");
    late_august.started = ts(2022, 8, 31, 23, 30);
    late_august.ended = ts(2022, 8, 31, 23, 59);

    let mut september = Ride::ok("SEP");
    september.started = ts(2022, 9, 1, 4, 30);
    september.ended = ts(2022, 9, 1, 5, 0);

    let df = batch(vec![late_august, september]);
    let out = august_cleaner().run(df, &reference()).unwrap();

    assert_eq!(kept_ids(&out.data), vec!["AUG".to_string()]);
}

#[test]
fn reference_coordinates_replace_raw_gps() {
    let df = batch(vec![Ride::ok("OK1")]);
    let out = august_cleaner().run(df, &reference()).unwrap();

    let end_lat = out
        .data
        .column(END_LAT)
        .unwrap()
        .as_materialized_series()
        .f64()
        .unwrap()
        .get(0)
        .unwrap();
    // "State St & Harrison St" reference latitude, not the raw 41.87.
    assert_eq!(end_lat, 41.8740);
}

#[test]
fn derives_duration_and_calendar_fields() {
    let df = batch(vec![Ride::ok("OK1")]);
    let out = august_cleaner().run(df, &reference()).unwrap();

    assert_eq!(i64_at(&out.data, "duration_sec", 0), 1800);

    let hour = out
        .data
        .column("hour")
        .unwrap()
        .as_materialized_series()
        .i8()
        .unwrap()
        .get(0)
        .unwrap();
    assert_eq!(hour, 9);

    let month = out
        .data
        .column("month")
        .unwrap()
        .as_materialized_series()
        .date()
        .unwrap()
        .as_date_iter()
        .next()
        .unwrap()
        .unwrap();
    assert_eq!(month, NaiveDate::from_ymd_opt(2022, 8, 1).unwrap());
}

#[test]
fn repairs_dst_fallback_durations() {
    let cleaner = TripCleaner::builder()
        .config(
            CleanerConfig::builder()
                .end_date(NaiveDate::from_ymd_opt(2022, 11, 30).unwrap())
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    // Crosses the 2022-11-06 rewind: naive duration is -25 min.
    let mut dst_ride = Ride::ok("DST");
    dst_ride.started = ts(2022, 11, 6, 1, 45);
    dst_ride.ended = ts(2022, 11, 6, 1, 20);

    // Negative duration on an ordinary day stays broken and gets filtered.
    let mut broken = Ride::ok("BAD");
    broken.started = ts(2022, 11, 8, 10, 0);
    broken.ended = ts(2022, 11, 8, 9, 35);

    let df = batch(vec![dst_ride, broken]);
    let out = cleaner.run(df, &reference()).unwrap();

    assert_eq!(kept_ids(&out.data), vec!["DST".to_string()]);
    assert_eq!(i64_at(&out.data, "duration_sec", 0), 2100);
    assert_eq!(out.report.dst_repaired_rows, 1);
}

#[test]
fn enforces_duration_bounds_as_open_interval() {
    let mut exactly_minute = Ride::ok("MIN");
    exactly_minute.ended = exactly_minute.started + chrono::Duration::seconds(60);

    let mut just_over = Ride::ok("OK1");
    just_over.ended = just_over.started + chrono::Duration::seconds(61);

    let mut marathon = Ride::ok("MAX");
    marathon.ended = marathon.started + chrono::Duration::seconds(86_000);

    let df = batch(vec![exactly_minute, just_over, marathon]);
    let cleaner = TripCleaner::builder().build().unwrap();
    let out = cleaner.run(df, &reference()).unwrap();

    assert_eq!(kept_ids(&out.data), vec!["OK1".to_string()]);
}

#[test]
fn recodes_category_labels() {
    let mut electric = Ride::ok("E1");
    electric.bike = "electric_bike";
    electric.user = "casual";

    let df = batch(vec![Ride::ok("C1"), electric]);
    let out = august_cleaner().run(df, &reference()).unwrap();

    let bikes: Vec<String> = out
        .data
        .column(RIDEABLE_TYPE)
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap()
        .into_iter()
        .flatten()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(bikes, vec!["classic".to_string(), "electric".to_string()]);
}

#[test]
fn unknown_category_label_aborts() {
    let mut scooter = Ride::ok("SCO");
    scooter.bike = "scooter";

    let df = batch(vec![scooter]);
    let err = august_cleaner().run(df, &reference()).unwrap_err();
    assert_eq!(err.error_code(), "UNKNOWN_CATEGORY");
}

#[test]
fn duplicate_ride_id_aborts() {
    let df = batch(vec![Ride::ok("DUP"), Ride::ok("DUP")]);
    let err = august_cleaner().run(df, &reference()).unwrap_err();
    assert_eq!(err.error_code(), "DUPLICATE_RIDE_ID");
}

#[test]
fn missing_required_column_aborts() {
    let df = batch(vec![Ride::ok("OK1")]).drop(MEMBER_CASUAL).unwrap();
    let err = august_cleaner().run(df, &reference()).unwrap_err();
    assert_eq!(err.error_code(), "SCHEMA_VIOLATION");
}

#[test]
fn conflicting_reference_is_rejected_up_front() {
    let df = df!(
        "station_name" => &["Clark St & Lake St", "Clark St & Lake St"],
        "latitude" => &[41.8858, 41.9001],
        "longitude" => &[-87.6308, -87.6308],
    )
    .unwrap();

    let err = StationReference::new(df).unwrap_err();
    assert_eq!(err.error_code(), "REFERENTIAL_AMBIGUITY");
}

#[test]
fn cleaning_is_idempotent() {
    let df = batch(vec![Ride::ok("OK1"), Ride::ok("OK2")]);
    let cleaner = august_cleaner();

    let once = cleaner.run(df, &reference()).unwrap();
    let twice = cleaner.run(once.data.clone(), &reference()).unwrap();

    assert!(once.data.equals(&twice.data));
    assert_eq!(twice.report.rows_removed, 0);
}

#[test]
fn stage_counts_shrink_monotonically() {
    let mut lost = Ride::ok("LOST");
    lost.end_station = None;
    lost.end_coords = None;

    let mut unlisted = Ride::ok("UNL");
    unlisted.start_station = Some("Warehouse");

    let mut short = Ride::ok("SHORT");
    short.ended = short.started + chrono::Duration::seconds(30);

    let df = batch(vec![Ride::ok("OK1"), lost, unlisted, short]);
    let out = august_cleaner().run(df, &reference()).unwrap();

    assert_eq!(kept_ids(&out.data), vec!["OK1".to_string()]);
    for window in out.report.stages.windows(2) {
        assert_eq!(window[1].rows_before, window[0].rows_after);
        assert!(window[1].rows_after <= window[1].rows_before);
    }
    assert_eq!(out.report.rows_before, 4);
    assert_eq!(out.report.rows_after, 1);
}

fn load_fixture(name: &str) -> DataFrame {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_try_parse_dates(true))
        .try_into_reader_with_file_path(Some(path))
        .unwrap()
        .finish()
        .unwrap()
}

#[test]
fn cleans_csv_fixtures_end_to_end() {
    let trips = load_fixture("trips.csv");
    let reference = StationReference::new(load_fixture("stations.csv")).unwrap();

    let out = august_cleaner().run(trips, &reference).unwrap();

    // F003 unlisted start, F005 at the 60 s floor, F006 no end at all.
    assert_eq!(
        kept_ids(&out.data),
        vec!["F001".to_string(), "F002".to_string(), "F004".to_string()]
    );
    assert_eq!(
        out.report.unlisted_stations.get("Testing - Charging"),
        Some(&1)
    );
    // F002 has no end station; its raw GPS fix survives resolution.
    let end_lat = out
        .data
        .column(END_LAT)
        .unwrap()
        .as_materialized_series()
        .f64()
        .unwrap()
        .get(1)
        .unwrap();
    assert_eq!(end_lat, 41.8803);
}

#[test]
fn writes_cleaned_data_and_report() {
    let dir = tempfile::TempDir::new().unwrap();
    let out = august_cleaner()
        .run(batch(vec![Ride::ok("OK1")]), &reference())
        .unwrap();

    let writer = OutputWriter::new(dir.path().to_path_buf(), None);
    let mut data = out.data;
    let data_path = writer.write_data(&mut data).unwrap();
    let report_path = writer.write_report(&out.report).unwrap();

    assert!(data_path.exists());
    let json = std::fs::read_to_string(report_path).unwrap();
    assert!(json.contains("\"rows_before\": 1"));
    assert!(json.contains("America/Chicago"));
}
