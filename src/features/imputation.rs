//! Median / mode imputation

use crate::data::{is_float_dtype, is_numeric_dtype};
use crate::error::{FraudError, Result};
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, error, info};

/// Fill missing cells column by column.
///
/// Numeric columns get the median of their present values and come back as
/// `Float64`; NaN counts as missing. String and boolean columns get their
/// most frequent value, ties going to the smallest. Columns without gaps are
/// returned untouched and the column order is kept.
pub fn impute_missing(df: &DataFrame) -> Result<DataFrame> {
    info!("Imputing missing values");
    let mut columns: Vec<Column> = Vec::with_capacity(df.width());

    for col in df.get_columns() {
        let series = col.as_materialized_series();
        let filled = if is_numeric_dtype(series.dtype()) {
            fill_numeric(series)?
        } else {
            match series.dtype() {
                DataType::String => fill_string(series)?,
                DataType::Boolean => fill_boolean(series)?,
                _ if series.null_count() == 0 => None,
                other => {
                    error!(column = %series.name(), dtype = %other, "Cannot impute column");
                    return Err(FraudError::feature(format!(
                        "Cannot impute column '{}' of type {}",
                        series.name(),
                        other
                    )));
                }
            }
        };

        match filled {
            Some(new_series) => columns.push(new_series.into()),
            None => columns.push(col.clone()),
        }
    }

    DataFrame::new(columns).map_err(|e| FraudError::feature("Failed to rebuild imputed table").with_source(e))
}

fn all_missing(series: &Series) -> FraudError {
    error!(column = %series.name(), "Column has no values to impute from");
    FraudError::feature(format!("Column '{}' has no non-missing values", series.name()))
}

fn fill_numeric(series: &Series) -> Result<Option<Series>> {
    let as_f64 = series
        .cast(&DataType::Float64)
        .map_err(|e| FraudError::feature(format!("Failed to cast '{}' to float", series.name())).with_source(e))?;
    let ca = as_f64
        .f64()
        .map_err(|e| FraudError::feature(format!("Column '{}' is not float", series.name())).with_source(e))?;

    let is_missing = |v: Option<f64>| v.map_or(true, f64::is_nan);
    let missing = if is_float_dtype(series.dtype()) {
        ca.into_iter().filter(|v| is_missing(*v)).count()
    } else {
        series.null_count()
    };
    if missing == 0 {
        return Ok(None);
    }

    let mut present: Vec<f64> = ca.into_iter().flatten().filter(|v| !v.is_nan()).collect();
    if present.is_empty() {
        return Err(all_missing(series));
    }
    let fill = median(&mut present);
    debug!(column = %series.name(), missing, median = fill, "Filling numeric column with median");

    let values: Vec<f64> = ca
        .into_iter()
        .map(|v| if is_missing(v) { fill } else { v.unwrap_or(fill) })
        .collect();
    Ok(Some(Series::new(series.name().clone(), values)))
}

/// Midpoint of the two central values for even lengths
fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Most frequent key; ties resolve to the smallest key
fn mode<K: Ord + Clone>(counts: &BTreeMap<K, usize>) -> Option<K> {
    let mut best: Option<(&K, usize)> = None;
    for (key, &count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((key, count));
        }
    }
    best.map(|(k, _)| k.clone())
}

fn fill_string(series: &Series) -> Result<Option<Series>> {
    if series.null_count() == 0 {
        return Ok(None);
    }
    let ca = series
        .str()
        .map_err(|e| FraudError::feature(format!("Column '{}' is not text", series.name())).with_source(e))?;

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in ca.into_iter().flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }
    let fill = mode(&counts).ok_or_else(|| all_missing(series))?;
    debug!(column = %series.name(), missing = series.null_count(), mode = fill, "Filling text column with mode");

    let values: Vec<&str> = ca.into_iter().map(|v| v.unwrap_or(fill)).collect();
    Ok(Some(Series::new(series.name().clone(), values)))
}

fn fill_boolean(series: &Series) -> Result<Option<Series>> {
    if series.null_count() == 0 {
        return Ok(None);
    }
    let ca = series
        .bool()
        .map_err(|e| FraudError::feature(format!("Column '{}' is not boolean", series.name())).with_source(e))?;

    let mut counts: BTreeMap<bool, usize> = BTreeMap::new();
    for value in ca.into_iter().flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }
    let fill = mode(&counts).ok_or_else(|| all_missing(series))?;
    debug!(column = %series.name(), missing = series.null_count(), mode = fill, "Filling boolean column with mode");

    let values: Vec<bool> = ca.into_iter().map(|v| v.unwrap_or(fill)).collect();
    Ok(Some(Series::new(series.name().clone(), values)))
}
