//! Stage 8: recode category columns to their canonical labels.

use crate::error::Result;
use crate::report::{Stage, StageReport};
use crate::schema::{MEMBER_CASUAL, RIDEABLE_TYPE};
use crate::types::{BikeType, UserType};
use crate::utils::str_column;
use polars::prelude::*;
use tracing::debug;

/// Rewrite `rideable_type` and `member_casual` with canonical labels.
///
/// The raw feed labels (`classic_bike`, `electric_bike`, ...) collapse to
/// `classic` / `docked` / `electric`; `member_casual` is normalized through
/// the same path. Nulls pass through. Any label outside the known
/// vocabulary aborts the run: an unrecognized category means the feed
/// changed shape and silent coercion would misattribute rides.
pub fn recode_categories(df: DataFrame) -> Result<(DataFrame, StageReport)> {
    let rows = df.height();
    let mut df = df;

    let bikes = recode_column(&df, RIDEABLE_TYPE, |s| {
        s.parse::<BikeType>().map(|b| b.as_str())
    })?;
    df.replace(RIDEABLE_TYPE, bikes)?;

    let users = recode_column(&df, MEMBER_CASUAL, |s| {
        s.parse::<UserType>().map(|u| u.as_str())
    })?;
    df.replace(MEMBER_CASUAL, users)?;

    debug!(rows, "recoded category columns");

    Ok((df, StageReport::transformed(Stage::Recode, rows)))
}

fn recode_column(
    df: &DataFrame,
    name: &str,
    map: impl Fn(&str) -> Result<&'static str>,
) -> Result<Series> {
    let values = str_column(df, name)?;
    let mut out: Vec<Option<&'static str>> = Vec::with_capacity(values.len());
    for opt in values.into_iter() {
        out.push(match opt {
            Some(raw) => Some(map(raw)?),
            None => None,
        });
    }
    Ok(Series::new(name.into(), out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RIDE_ID;

    fn labels(df: &DataFrame, name: &str) -> Vec<Option<String>> {
        str_column(df, name)
            .unwrap()
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect()
    }

    #[test]
    fn test_recode_raw_labels() {
        let df = df!(
            RIDE_ID => &["A", "B", "C"],
            RIDEABLE_TYPE => &["classic_bike", "electric_bike", "docked_bike"],
            MEMBER_CASUAL => &["member", "casual", "member"],
        )
        .unwrap();

        let (out, report) = recode_categories(df).unwrap();
        assert_eq!(report.rows_removed, 0);
        assert_eq!(
            labels(&out, RIDEABLE_TYPE),
            vec![
                Some("classic".to_string()),
                Some("electric".to_string()),
                Some("docked".to_string())
            ]
        );
        assert_eq!(
            labels(&out, MEMBER_CASUAL),
            vec![
                Some("member".to_string()),
                Some("casual".to_string()),
                Some("member".to_string())
            ]
        );
    }

    #[test]
    fn test_recode_is_idempotent() {
        let df = df!(
            RIDE_ID => &["A"],
            RIDEABLE_TYPE => &["electric"],
            MEMBER_CASUAL => &["casual"],
        )
        .unwrap();

        let (once, _) = recode_categories(df).unwrap();
        let (twice, _) = recode_categories(once.clone()).unwrap();
        assert!(once.equals(&twice));
    }

    #[test]
    fn test_unknown_label_is_fatal() {
        let df = df!(
            RIDE_ID => &["A"],
            RIDEABLE_TYPE => &["scooter"],
            MEMBER_CASUAL => &["member"],
        )
        .unwrap();

        let err = recode_categories(df).unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_CATEGORY");
        assert!(err.to_string().contains("scooter"));
    }

    #[test]
    fn test_null_labels_pass_through() {
        let df = df!(
            RIDE_ID => &["A", "B"],
            RIDEABLE_TYPE => &[Some("classic_bike"), None],
            MEMBER_CASUAL => &[Some("member"), None],
        )
        .unwrap();

        let (out, _) = recode_categories(df).unwrap();
        assert_eq!(
            labels(&out, RIDEABLE_TYPE),
            vec![Some("classic".to_string()), None]
        );
    }
}
