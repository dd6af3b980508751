//! Validated station reference table.
//!
//! The reference is supplied externally (municipal registry joined with
//! canonical coordinates) and consumed read-only. A station name may appear
//! more than once across re-activations; repeats are only legal when every
//! occurrence carries the same coordinates.

use crate::error::{CleaningError, Result};
use crate::schema::{LATITUDE, LONGITUDE, STATION_NAME};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Station reference table wrapper.
///
/// Construction validates the schema and rejects referential ambiguity;
/// afterwards the table can be joined against without further checks.
#[derive(Debug, Clone)]
pub struct StationReference {
    df: DataFrame,
}

impl StationReference {
    /// Wrap and validate a reference table.
    ///
    /// Requires `station_name` (String) plus `latitude`/`longitude`
    /// (Float64) columns. Fails with [`CleaningError::ReferentialAmbiguity`]
    /// when one name maps to two different coordinate pairs.
    pub fn new(df: DataFrame) -> Result<Self> {
        for (name, expected) in [
            (STATION_NAME, DataType::String),
            (LATITUDE, DataType::Float64),
            (LONGITUDE, DataType::Float64),
        ] {
            let col = df
                .column(name)
                .map_err(|_| CleaningError::SchemaViolation {
                    column: name.to_string(),
                    expected: format!("{}", expected),
                    found: "missing".to_string(),
                })?;
            if col.dtype() != &expected {
                return Err(CleaningError::SchemaViolation {
                    column: name.to_string(),
                    expected: format!("{}", expected),
                    found: format!("{}", col.dtype()),
                });
            }
        }

        Self::check_coordinate_conflicts(&df)?;
        debug!("Station reference validated: {} rows", df.height());

        Ok(Self { df })
    }

    fn check_coordinate_conflicts(df: &DataFrame) -> Result<()> {
        let names = df.column(STATION_NAME)?.as_materialized_series().str()?.clone();
        let lats = df.column(LATITUDE)?.as_materialized_series().f64()?.clone();
        let lngs = df.column(LONGITUDE)?.as_materialized_series().f64()?.clone();

        let mut seen: HashMap<String, (f64, f64)> = HashMap::with_capacity(names.len());

        for ((opt_name, opt_lat), opt_lng) in names.into_iter().zip(lats.into_iter()).zip(lngs.into_iter()) {
            let (Some(name), Some(lat), Some(lng)) = (opt_name, opt_lat, opt_lng) else {
                continue;
            };
            match seen.get(name) {
                Some(&(first_lat, first_lng)) => {
                    if first_lat != lat || first_lng != lng {
                        return Err(CleaningError::ReferentialAmbiguity {
                            station: name.to_string(),
                            first_lat,
                            first_lng,
                            second_lat: lat,
                            second_lng: lng,
                        });
                    }
                }
                None => {
                    seen.insert(name.to_string(), (lat, lng));
                }
            }
        }

        Ok(())
    }

    /// The underlying reference frame.
    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    /// Just the columns needed for coordinate joins.
    pub fn coordinates(&self) -> Result<DataFrame> {
        Ok(self.df.select([STATION_NAME, LATITUDE, LONGITUDE])?)
    }

    /// Set of active station names.
    pub fn names(&self) -> Result<HashSet<String>> {
        let names = self.df.column(STATION_NAME)?.as_materialized_series().str()?.clone();
        Ok(names.into_iter().flatten().map(|s| s.to_string()).collect())
    }

    /// Number of reference rows (re-activation repeats included).
    pub fn len(&self) -> usize {
        self.df.height()
    }

    /// Whether the reference is empty.
    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_frame(names: &[&str], lats: &[f64], lngs: &[f64]) -> DataFrame {
        df!(
            STATION_NAME => names,
            LATITUDE => lats,
            LONGITUDE => lngs,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_reference() {
        let df = reference_frame(&["A", "B"], &[41.9, 41.8], &[-87.6, -87.7]);
        let reference = StationReference::new(df).unwrap();
        assert_eq!(reference.len(), 2);
        assert!(reference.names().unwrap().contains("A"));
    }

    #[test]
    fn test_repeated_name_same_coordinates_allowed() {
        let df = reference_frame(&["A", "A"], &[41.9, 41.9], &[-87.6, -87.6]);
        assert!(StationReference::new(df).is_ok());
    }

    #[test]
    fn test_conflicting_coordinates_rejected() {
        let df = reference_frame(&["A", "A"], &[41.9, 41.5], &[-87.6, -87.6]);
        let err = StationReference::new(df).unwrap_err();
        assert_eq!(err.error_code(), "REFERENTIAL_AMBIGUITY");
        assert!(err.to_string().contains('A'));
    }

    #[test]
    fn test_missing_column_rejected() {
        let df = df!(STATION_NAME => &["A"]).unwrap();
        let err = StationReference::new(df).unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_VIOLATION");
    }
}
