//! Dataset ingestion
//!
//! Loads the raw transaction table from CSV and checks the structural
//! assumptions the rest of the pipeline relies on:
//! - missing cells and duplicate rows are reported, never fatal
//! - the monetary amount column must exist and be numeric
//! - heavy class imbalance in the label is flagged

mod loader;

pub use loader::{save_csv, DatasetLoader, ValidationReport, ValidationWarning};

use polars::prelude::DataType;

/// Check if dtype is numeric
pub(crate) fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if dtype is floating point (may carry NaN besides nulls)
pub(crate) fn is_float_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_dtypes() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float32));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
        assert!(is_float_dtype(&DataType::Float64));
        assert!(!is_float_dtype(&DataType::Int32));
    }
}
