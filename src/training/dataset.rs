//! Conversion of the engineered table into a feature matrix and label vector

use crate::data::is_numeric_dtype;
use crate::error::{FraudError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::{debug, error};

/// Model-ready data: `x` row-aligned with binary labels `y`
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    /// Column name of every feature in `x`, in order
    pub feature_names: Vec<String>,
    pub target: String,
}

impl Dataset {
    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }
}

/// Split `df` into features (every column except `target`) and labels.
///
/// Features must be numeric or boolean without missing values; labels must
/// be 0 or 1.
pub fn to_dataset(df: &DataFrame, target: &str) -> Result<Dataset> {
    let target_col = df.column(target).map_err(|e| {
        error!(column = target, "Target column not found");
        FraudError::modelling(format!("Target column '{}' not found", target)).with_source(e)
    })?;
    let y = column_values(target_col)?;
    if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(FraudError::modelling(format!(
            "Target column '{}' must hold 0/1 labels, found {}",
            target, bad
        )));
    }

    let feature_names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .filter(|name| name.as_str() != target)
        .map(|name| name.to_string())
        .collect();
    if feature_names.is_empty() {
        return Err(FraudError::modelling("No feature columns left besides the target"));
    }

    let columns: Vec<Vec<f64>> = feature_names
        .iter()
        .map(|name| {
            let col = df
                .column(name)
                .map_err(|e| FraudError::modelling(format!("Column '{}' not found", name)).with_source(e))?;
            column_values(col)
        })
        .collect::<Result<_>>()?;

    // Row-major matrix from column-major data
    let x = Array2::from_shape_fn((df.height(), columns.len()), |(r, c)| columns[c][r]);
    debug!(rows = x.nrows(), features = x.ncols(), "Feature matrix assembled");

    Ok(Dataset {
        x,
        y: Array1::from_vec(y),
        feature_names,
        target: target.to_string(),
    })
}

fn column_values(col: &Column) -> Result<Vec<f64>> {
    let name = col.name();
    if !is_numeric_dtype(col.dtype()) && col.dtype() != &DataType::Boolean {
        error!(column = %name, dtype = %col.dtype(), "Non-numeric column reached model fitting");
        return Err(FraudError::modelling(format!(
            "Column '{}' has non-numeric type {}; encode or drop it before training",
            name,
            col.dtype()
        )));
    }

    let as_f64 = col
        .cast(&DataType::Float64)
        .map_err(|e| FraudError::modelling(format!("Failed to cast '{}' to float", name)).with_source(e))?;
    let ca = as_f64
        .f64()
        .map_err(|e| FraudError::modelling(format!("Column '{}' is not float", name)).with_source(e))?;

    ca.into_iter()
        .map(|v| match v {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(FraudError::modelling(format!(
                "Column '{}' contains missing or non-finite values",
                name
            ))),
        })
        .collect()
}
