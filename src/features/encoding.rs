//! One-hot encoding with a dropped reference category

use crate::error::{FraudError, Result};
use polars::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, error, info};

/// Replace each named column with `Int32` indicator columns.
///
/// Categories are the distinct non-null values rendered as text and sorted;
/// the first one is the reference and gets no column. Indicators are named
/// `<column>_<category>` and appended after the remaining columns. A null
/// cell encodes as all zeros.
pub fn encode_categorical<S: AsRef<str>>(df: &DataFrame, columns: &[S]) -> Result<DataFrame> {
    info!(columns = columns.len(), "Encoding categorical features");
    let mut result = df.clone();
    let mut indicators: Vec<Series> = Vec::new();

    for name in columns {
        let name = name.as_ref();
        let col = df.column(name).map_err(|e| {
            error!(column = name, "Categorical column not found");
            FraudError::feature(format!("Categorical column '{}' not found", name)).with_source(e)
        })?;
        let text = col
            .cast(&DataType::String)
            .map_err(|e| FraudError::feature(format!("Failed to read '{}' as text", name)).with_source(e))?;
        let ca = text
            .str()
            .map_err(|e| FraudError::feature(format!("Column '{}' is not text", name)).with_source(e))?;

        let categories: BTreeSet<&str> = ca.into_iter().flatten().collect();
        debug!(column = name, categories = categories.len(), "Observed categories");

        for category in categories.iter().skip(1) {
            let values: Vec<i32> = ca
                .into_iter()
                .map(|v| i32::from(v == Some(*category)))
                .collect();
            indicators.push(Series::new(format!("{}_{}", name, category).into(), values));
        }

        result = result
            .drop(name)
            .map_err(|e| FraudError::feature(format!("Failed to drop column '{}'", name)).with_source(e))?;
    }

    for series in indicators {
        let indicator = series.name().clone();
        result
            .with_column(series)
            .map_err(|e| FraudError::feature(format!("Failed to add column '{}'", indicator)).with_source(e))?;
    }

    info!(columns = result.width(), "Categorical features encoded successfully");
    Ok(result)
}
