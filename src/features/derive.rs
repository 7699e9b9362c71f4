//! Time and amount based features

use crate::config::{BalancePair, FeatureConfig};
use crate::data::is_numeric_dtype;
use crate::error::{FraudError, Result};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use tracing::{debug, error, info};

/// Name of the weekday column (0 = Monday)
pub const DAY_OF_WEEK: &str = "day_of_week";
/// Name of the log-scaled amount column
pub const LOG_AMOUNT: &str = "log_amount";

/// Append `day_of_week`, `log_amount` and the two balance differences.
///
/// Source columns stay in place. Nulls in a source propagate to the
/// derived value.
pub fn derive_features(df: &DataFrame, config: &FeatureConfig) -> Result<DataFrame> {
    info!("Creating features");
    let mut result = df.clone();

    let weekday = day_of_week(df, &config.date_column, &config.date_format)?;
    let log_amount = numeric_values(df, &config.amount_column)?
        .into_iter()
        .map(|v| v.map(f64::ln_1p))
        .collect::<Vec<_>>();
    let orig_diff = balance_diff(df, &config.origin_balance)?;
    let dest_diff = balance_diff(df, &config.destination_balance)?;

    let derived = [
        Series::new(DAY_OF_WEEK.into(), weekday),
        Series::new(LOG_AMOUNT.into(), log_amount),
        Series::new(config.origin_balance.output.as_str().into(), orig_diff),
        Series::new(config.destination_balance.output.as_str().into(), dest_diff),
    ];
    for series in derived {
        let name = series.name().clone();
        result
            .with_column(series)
            .map_err(|e| FraudError::feature(format!("Failed to add column '{}'", name)).with_source(e))?;
    }

    info!(columns = result.width(), "Features created successfully");
    Ok(result)
}

fn source_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name).map_err(|e| {
        error!(column = name, "Source column for feature not found");
        FraudError::feature(format!("Column '{}' not found", name)).with_source(e)
    })
}

fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let col = source_column(df, name)?;
    if !is_numeric_dtype(col.dtype()) {
        error!(column = name, dtype = %col.dtype(), "Feature source is not numeric");
        return Err(FraudError::feature(format!(
            "Column '{}' must be numeric, found {}",
            name,
            col.dtype()
        )));
    }
    let as_f64 = col
        .cast(&DataType::Float64)
        .map_err(|e| FraudError::feature(format!("Failed to cast '{}' to float", name)).with_source(e))?;
    let ca = as_f64
        .f64()
        .map_err(|e| FraudError::feature(format!("Column '{}' is not float", name)).with_source(e))?;
    Ok(ca.into_iter().collect())
}

fn balance_diff(df: &DataFrame, pair: &BalancePair) -> Result<Vec<Option<f64>>> {
    let before = numeric_values(df, &pair.before)?;
    let after = numeric_values(df, &pair.after)?;
    Ok(before
        .into_iter()
        .zip(after)
        .map(|(b, a)| Some(b? - a?))
        .collect())
}

fn day_of_week(df: &DataFrame, name: &str, format: &str) -> Result<Vec<Option<i64>>> {
    let col = source_column(df, name)?;
    let ca = col.str().map_err(|e| {
        FraudError::feature(format!("Date column '{}' must hold text, found {}", name, col.dtype())).with_source(e)
    })?;

    let mut days = Vec::with_capacity(ca.len());
    for (row, value) in ca.into_iter().enumerate() {
        let day = match value {
            Some(text) => {
                let date = NaiveDate::parse_from_str(text.trim(), format).map_err(|e| {
                    error!(column = name, row, value = text, "Unparseable date");
                    FraudError::feature(format!(
                        "Cannot parse '{}' in column '{}' (row {}) with format '{}'",
                        text, name, row, format
                    ))
                    .with_source(e)
                })?;
                Some(date.weekday().num_days_from_monday() as i64)
            }
            None => None,
        };
        days.push(day);
    }
    debug!(column = name, rows = days.len(), "Parsed transaction dates");
    Ok(days)
}

/// Remove the named columns; names that are not present are skipped
pub fn drop_columns<S: AsRef<str>>(df: &DataFrame, names: &[S]) -> Result<DataFrame> {
    let mut result = df.clone();
    for name in names {
        let name = name.as_ref();
        if result.column(name).is_err() {
            debug!(column = name, "Column to drop not present, skipping");
            continue;
        }
        result = result
            .drop(name)
            .map_err(|e| FraudError::feature(format!("Failed to drop column '{}'", name)).with_source(e))?;
    }
    debug!(columns = result.width(), "Dropped identifier columns");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;

    fn sample() -> DataFrame {
        df!(
            "amount" => &[Some(0.0), Some(std::f64::consts::E - 1.0), None],
            "oldbalanceOrg" => &[100.0, 50.0, 10.0],
            "newbalanceOrig" => &[90.0, 50.0, 0.0],
            "oldbalanceDest" => &[0i64, 10, 20],
            "newbalanceDest" => &[10i64, 10, 5],
            "Date of transaction" => &[Some("14/10/2024"), Some("20/10/2024"), None]
        )
        .unwrap()
    }

    #[test]
    fn test_derive_features() {
        let df = derive_features(&sample(), &FeatureConfig::default()).unwrap();
        assert_eq!(df.width(), 10);

        let dow = df.column(DAY_OF_WEEK).unwrap().i64().unwrap();
        assert_eq!(dow.get(0), Some(0));
        assert_eq!(dow.get(1), Some(6));
        assert_eq!(dow.get(2), None);

        let log_amount = df.column(LOG_AMOUNT).unwrap().f64().unwrap();
        assert_eq!(log_amount.get(0), Some(0.0));
        assert!((log_amount.get(1).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(log_amount.get(2), None);

        let orig = df.column("orig_balance_diff").unwrap().f64().unwrap();
        assert_eq!(orig.get(0), Some(10.0));
        let dest = df.column("dest_balance_diff").unwrap().f64().unwrap();
        assert_eq!(dest.get(2), Some(15.0));
    }

    #[test]
    fn test_missing_source_column() {
        let df = sample().drop("newbalanceDest").unwrap();
        let err = derive_features(&df, &FeatureConfig::default()).unwrap_err();
        assert_eq!(err.stage(), Stage::Feature);
        assert!(err.to_string().contains("newbalanceDest"));
    }

    #[test]
    fn test_bad_date_fails() {
        let mut df = sample();
        df.with_column(Series::new("Date of transaction".into(), &["2024-10-14", "x", "y"]))
            .unwrap();
        let err = derive_features(&df, &FeatureConfig::default()).unwrap_err();
        assert_eq!(err.stage(), Stage::Feature);
    }

    #[test]
    fn test_drop_columns_skips_absent() {
        let df = sample();
        let result = drop_columns(&df, &["Date of transaction", "nameOrig"]).unwrap();
        assert_eq!(result.width(), df.width() - 1);
        assert!(result.column("Date of transaction").is_err());
    }
}
