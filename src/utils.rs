//! Shared DataFrame helpers used across the cleaning stages.

use crate::error::Result;
use crate::schema::RIDE_ID;
use polars::prelude::*;
use std::collections::HashSet;

/// Clone out a string column by name.
pub fn str_column(df: &DataFrame, name: &str) -> Result<StringChunked> {
    Ok(df.column(name)?.as_materialized_series().str()?.clone())
}

/// Evaluate a boolean expression against the batch and return the mask.
///
/// Null predicate results become false, so every row lands on exactly one
/// side of a subsequent [`split_on_mask`].
pub fn eval_mask(df: &DataFrame, predicate: Expr) -> Result<BooleanChunked> {
    let mask_df = df
        .clone()
        .lazy()
        .select([predicate.fill_null(lit(false)).alias("__mask")])
        .collect()?;
    Ok(mask_df
        .column("__mask")?
        .as_materialized_series()
        .bool()?
        .clone())
}

/// Split a batch into (kept, removed) halves on a keep-mask.
pub fn split_on_mask(df: &DataFrame, keep: &BooleanChunked) -> Result<(DataFrame, DataFrame)> {
    let kept = df.filter(keep)?;
    let inverted = !keep;
    let removed = df.filter(&inverted)?;
    Ok((kept, removed))
}

/// First few ride ids of a batch, for removed-record samples.
pub fn sample_ride_ids(df: &DataFrame, limit: usize) -> Result<Vec<String>> {
    let ids = str_column(df, RIDE_ID)?;
    Ok(ids
        .into_iter()
        .flatten()
        .take(limit)
        .map(|s| s.to_string())
        .collect())
}

/// Keep-mask marking the first occurrence of each id, in row order.
pub fn first_occurrence_mask(ids: &StringChunked) -> BooleanChunked {
    let mut seen: HashSet<&str> = HashSet::with_capacity(ids.len());
    let flags: Vec<bool> = ids
        .into_iter()
        .map(|opt_id| match opt_id {
            Some(id) => seen.insert(id),
            None => false,
        })
        .collect();
    BooleanChunked::from_slice("first".into(), &flags)
}
