//! Column names and schema validation for trip batches.
//!
//! Validation runs before any transformation: a missing required column or
//! an incompatible dtype aborts the run with the column name and the
//! observed type, never a silent drop.

use crate::error::{CleaningError, Result};
use polars::prelude::*;
use std::collections::HashSet;

// Input columns.
pub const RIDE_ID: &str = "ride_id";
pub const RIDEABLE_TYPE: &str = "rideable_type";
pub const STARTED_AT: &str = "started_at";
pub const ENDED_AT: &str = "ended_at";
pub const START_STATION_NAME: &str = "start_station_name";
pub const START_STATION_ID: &str = "start_station_id";
pub const END_STATION_NAME: &str = "end_station_name";
pub const END_STATION_ID: &str = "end_station_id";
pub const START_LAT: &str = "start_lat";
pub const START_LNG: &str = "start_lng";
pub const END_LAT: &str = "end_lat";
pub const END_LNG: &str = "end_lng";
pub const MEMBER_CASUAL: &str = "member_casual";

// Reference table columns.
pub const STATION_NAME: &str = "station_name";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const FIRST_SEEN: &str = "first_seen";

// Derived columns.
pub const DURATION_SEC: &str = "duration_sec";
pub const MONTH: &str = "month";
pub const HOUR: &str = "hour";
pub const WEEKDAY: &str = "weekday";
pub const DAY_OF_MONTH: &str = "day_of_month";

/// Expected dtype class for a trip column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExpectedType {
    Text,
    Timestamp,
    Coordinate,
}

impl ExpectedType {
    fn matches(&self, dtype: &DataType) -> bool {
        match self {
            ExpectedType::Text => matches!(dtype, DataType::String),
            ExpectedType::Timestamp => matches!(dtype, DataType::Datetime(_, _)),
            ExpectedType::Coordinate => matches!(dtype, DataType::Float64 | DataType::Float32),
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ExpectedType::Text => "String",
            ExpectedType::Timestamp => "Datetime",
            ExpectedType::Coordinate => "Float64",
        }
    }
}

const REQUIRED: &[(&str, ExpectedType)] = &[
    (RIDE_ID, ExpectedType::Text),
    (RIDEABLE_TYPE, ExpectedType::Text),
    (STARTED_AT, ExpectedType::Timestamp),
    (ENDED_AT, ExpectedType::Timestamp),
    (START_STATION_NAME, ExpectedType::Text),
    (END_STATION_NAME, ExpectedType::Text),
    (MEMBER_CASUAL, ExpectedType::Text),
];

// Raw coordinates and station ids may be absent (already-cleaned input),
// but when present their dtype is still checked.
const OPTIONAL: &[(&str, ExpectedType)] = &[
    (START_STATION_ID, ExpectedType::Text),
    (END_STATION_ID, ExpectedType::Text),
    (START_LAT, ExpectedType::Coordinate),
    (START_LNG, ExpectedType::Coordinate),
    (END_LAT, ExpectedType::Coordinate),
    (END_LNG, ExpectedType::Coordinate),
];

/// Whether the batch carries a column with this name.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Validate the trip batch schema.
///
/// Required columns must exist with a compatible dtype; optional columns
/// are dtype-checked only when present.
pub fn validate_trip_schema(df: &DataFrame) -> Result<()> {
    for (name, expected) in REQUIRED {
        let col = df
            .column(name)
            .map_err(|_| CleaningError::SchemaViolation {
                column: name.to_string(),
                expected: expected.description().to_string(),
                found: "missing".to_string(),
            })?;
        check_dtype(name, *expected, col.dtype())?;
    }

    for (name, expected) in OPTIONAL {
        if let Ok(col) = df.column(name) {
            check_dtype(name, *expected, col.dtype())?;
        }
    }

    Ok(())
}

fn check_dtype(name: &str, expected: ExpectedType, found: &DataType) -> Result<()> {
    if expected.matches(found) {
        Ok(())
    } else {
        Err(CleaningError::SchemaViolation {
            column: name.to_string(),
            expected: expected.description().to_string(),
            found: format!("{}", found),
        })
    }
}

/// Reject batches with a null or repeated `ride_id`.
///
/// Ambiguous identity would make the downstream per-ride dedup silently
/// lossy, so the whole batch is refused instead.
pub fn validate_ride_id_uniqueness(df: &DataFrame) -> Result<()> {
    let ids = df.column(RIDE_ID)?.as_materialized_series().str()?.clone();
    let mut seen: HashSet<&str> = HashSet::with_capacity(ids.len());

    for opt_id in ids.into_iter() {
        match opt_id {
            Some(id) => {
                if !seen.insert(id) {
                    return Err(CleaningError::DuplicateRideId(id.to_string()));
                }
            }
            None => {
                return Err(CleaningError::SchemaViolation {
                    column: RIDE_ID.to_string(),
                    expected: "non-null String".to_string(),
                    found: "null".to_string(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(d: u32, h: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 6, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn minimal_batch() -> DataFrame {
        df!(
            RIDE_ID => &["A", "B"],
            RIDEABLE_TYPE => &["classic_bike", "electric_bike"],
            STARTED_AT => &[ts(1, 10), ts(2, 11)],
            ENDED_AT => &[ts(1, 11), ts(2, 12)],
            START_STATION_NAME => &[Some("Clark St"), None],
            END_STATION_NAME => &[Some("State St"), Some("Clark St")],
            MEMBER_CASUAL => &["member", "casual"],
        )
        .unwrap()
    }

    #[test]
    fn test_valid_schema_passes() {
        assert!(validate_trip_schema(&minimal_batch()).is_ok());
    }

    #[test]
    fn test_missing_required_column() {
        let df = minimal_batch().drop(STARTED_AT).unwrap();
        let err = validate_trip_schema(&df).unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_VIOLATION");
        assert!(err.to_string().contains(STARTED_AT));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_wrong_dtype_reported_with_observed_type() {
        let mut df = minimal_batch();
        df.replace(STARTED_AT, Series::new(STARTED_AT.into(), &["notadate", "x"]))
            .unwrap();
        let err = validate_trip_schema(&df).unwrap_err();
        assert!(err.to_string().contains("Datetime"));
        assert!(err.to_string().contains("str"));
    }

    #[test]
    fn test_optional_column_dtype_checked_when_present() {
        let mut df = minimal_batch();
        df.with_column(Series::new(END_LAT.into(), &["41.9", "41.8"]))
            .unwrap();
        assert!(validate_trip_schema(&df).is_err());
    }

    #[test]
    fn test_duplicate_ride_id_rejected() {
        let mut df = minimal_batch();
        df.replace(RIDE_ID, Series::new(RIDE_ID.into(), &["A", "A"]))
            .unwrap();
        let err = validate_ride_id_uniqueness(&df).unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_RIDE_ID");
    }

    #[test]
    fn test_null_ride_id_rejected() {
        let mut df = minimal_batch();
        df.replace(RIDE_ID, Series::new(RIDE_ID.into(), &[Some("A"), None]))
            .unwrap();
        assert!(validate_ride_id_uniqueness(&df).is_err());
    }
}
