//! CSV loading and structural validation

use crate::config::DataConfig;
use crate::error::{FraudError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::{error, info, warn};

use super::is_numeric_dtype;

/// Issue found while validating a freshly loaded table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationWarning {
    /// Table contains null cells
    MissingValues { count: usize, columns: Vec<(String, usize)> },
    /// Rows identical in every column to an earlier row
    DuplicateRows { count: usize, total: usize },
    /// Minority label share below the configured ratio
    ClassImbalance { column: String, minority_ratio: f64 },
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationWarning::MissingValues { count, .. } => write!(
                f,
                "Data contains {} missing values. Consider handling them in preprocessing.",
                count
            ),
            ValidationWarning::DuplicateRows { count, total } => write!(
                f,
                "Data contains {} duplicate records out of {}. Consider handling them in preprocessing.",
                count, total
            ),
            ValidationWarning::ClassImbalance { column, minority_ratio } => write!(
                f,
                "Label column '{}' is imbalanced: minority class is {:.2}% of rows. Accuracy may be misleading.",
                column,
                minority_ratio * 100.0
            ),
        }
    }
}

/// Outcome of [`DatasetLoader::validate`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub n_rows: usize,
    pub n_columns: usize,
    pub missing_values: usize,
    pub duplicate_rows: usize,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Loader for the raw transaction dataset
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    amount_column: String,
    target_column: Option<String>,
    infer_schema_rows: usize,
    imbalance_warning_ratio: f64,
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new(&DataConfig::default())
    }
}

impl DatasetLoader {
    /// Create a loader from the data section of the pipeline config
    pub fn new(config: &DataConfig) -> Self {
        Self {
            amount_column: config.amount_column.clone(),
            target_column: Some(config.target_column.clone()),
            infer_schema_rows: config.infer_schema_rows,
            imbalance_warning_ratio: config.imbalance_warning_ratio,
        }
    }

    /// Load a CSV file with a header row
    pub fn load(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        if !path.exists() {
            error!(file = %path.display(), "File not found");
            return Err(FraudError::load(format!("File not found: {}", path.display())));
        }

        info!(file = %path.display(), "Loading data");
        let file = File::open(path).map_err(|e| {
            error!(file = %path.display(), error = %e, "Failed to open data file");
            FraudError::load(format!("Failed to open {}", path.display())).with_source(e)
        })?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_rows))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| {
                error!(file = %path.display(), error = %e, "Failed to parse data file");
                FraudError::load(format!("Failed to load data from {}", path.display())).with_source(e)
            })?;

        info!(
            rows = df.height(),
            columns = df.width(),
            "Data loaded successfully with {} records and {} columns",
            df.height(),
            df.width()
        );
        Ok(df)
    }

    /// Check missing values, duplicates and the amount column's type.
    ///
    /// Only a missing or non-numeric amount column is an error; everything
    /// else is logged and returned as a warning.
    pub fn validate(&self, df: &DataFrame) -> Result<ValidationReport> {
        info!("Starting data validation");
        let mut report = ValidationReport {
            n_rows: df.height(),
            n_columns: df.width(),
            ..Default::default()
        };

        let per_column: Vec<(String, usize)> = df
            .get_columns()
            .iter()
            .filter(|col| col.null_count() > 0)
            .map(|col| (col.name().to_string(), col.null_count()))
            .collect();
        report.missing_values = per_column.iter().map(|(_, n)| n).sum();
        if report.missing_values > 0 {
            let warning = ValidationWarning::MissingValues {
                count: report.missing_values,
                columns: per_column,
            };
            warn!("{}", warning);
            report.warnings.push(warning);
        }

        report.duplicate_rows = count_duplicate_rows(df)?;
        if report.duplicate_rows > 0 {
            let warning = ValidationWarning::DuplicateRows {
                count: report.duplicate_rows,
                total: df.height(),
            };
            warn!("{}", warning);
            report.warnings.push(warning);
        }

        let amount = df.column(&self.amount_column).map_err(|e| {
            error!(column = %self.amount_column, "Amount column missing");
            FraudError::validation(format!("Missing '{}' column.", self.amount_column)).with_source(e)
        })?;
        if !is_numeric_dtype(amount.dtype()) {
            error!(column = %self.amount_column, dtype = %amount.dtype(), "Amount column is not numeric");
            return Err(FraudError::validation(format!(
                "Invalid data type in '{}' column: expected numeric, found {}.",
                self.amount_column,
                amount.dtype()
            )));
        }

        if let Some(target) = &self.target_column {
            if let Some(warning) = self.check_imbalance(df, target) {
                warn!("{}", warning);
                report.warnings.push(warning);
            }
        }

        info!(warnings = report.warnings.len(), "Data validation completed");
        Ok(report)
    }

    fn check_imbalance(&self, df: &DataFrame, target: &str) -> Option<ValidationWarning> {
        let labels = df.column(target).ok()?.cast(&DataType::Float64).ok()?;
        let values: Vec<f64> = labels.f64().ok()?.into_iter().flatten().collect();
        if values.is_empty() {
            return None;
        }
        let positives = values.iter().filter(|&&v| v > 0.5).count();
        let minority = positives.min(values.len() - positives);
        let ratio = minority as f64 / values.len() as f64;

        if ratio < self.imbalance_warning_ratio {
            Some(ValidationWarning::ClassImbalance {
                column: target.to_string(),
                minority_ratio: ratio,
            })
        } else {
            None
        }
    }
}

/// Count rows that repeat an earlier row exactly
fn count_duplicate_rows(df: &DataFrame) -> Result<usize> {
    let distinct = df
        .unique_stable(None, UniqueKeepStrategy::First, None)
        .map_err(|e| FraudError::validation("Failed to check duplicate rows").with_source(e))?;
    Ok(df.height() - distinct.height())
}

/// Save a table to CSV, creating parent directories as needed
pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            FraudError::load(format!("Failed to create directory {}", parent.display())).with_source(e)
        })?;
    }

    let mut file = File::create(path).map_err(|e| {
        FraudError::load(format!("Failed to create {}", path.display())).with_source(e)
    })?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .map_err(|e| FraudError::load(format!("Failed to write {}", path.display())).with_source(e))?;

    info!(file = %path.display(), rows = df.height(), "Processed data saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use std::io::Write;

    fn write_csv(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_csv() {
        let file = write_csv(&["amount,type,isFraud", "10.5,CASH_IN,0", "20.0,TRANSFER,1", "3.0,CASH_IN,0"]);
        let loader = DatasetLoader::default();

        let df = loader.load(file.path()).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);
    }

    #[test]
    fn test_load_missing_file() {
        let loader = DatasetLoader::default();
        let err = loader.load("/definitely/not/here.csv").unwrap_err();
        assert_eq!(err.stage(), Stage::Load);
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn test_validate_reports_missing_and_duplicates() {
        let df = df!(
            "amount" => &[Some(1.0), None, Some(3.0), Some(3.0)],
            "type" => &["A", "B", "C", "C"],
            "isFraud" => &[0i64, 1, 0, 0]
        )
        .unwrap();

        let report = DatasetLoader::default().validate(&df).unwrap();
        assert_eq!(report.missing_values, 1);
        assert_eq!(report.duplicate_rows, 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_duplicates_count_every_repeat_after_the_first() {
        let df = df!(
            "amount" => &[Some(5.0), Some(5.0), Some(5.0), None, None, Some(7.0)],
            "type" => &[Some("A"), Some("A"), Some("A"), None, None, Some("A")]
        )
        .unwrap();

        assert_eq!(count_duplicate_rows(&df).unwrap(), 3);
    }

    #[test]
    fn test_validate_rejects_text_amount() {
        let df = df!(
            "amount" => &["1.0", "abc"],
            "isFraud" => &[0i64, 1]
        )
        .unwrap();

        let err = DatasetLoader::default().validate(&df).unwrap_err();
        assert_eq!(err.stage(), Stage::Validation);
    }

    #[test]
    fn test_validate_flags_imbalance() {
        let mut labels = vec![0i64; 99];
        labels.push(1);
        let amounts: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let df = df!("amount" => amounts, "isFraud" => labels).unwrap();

        let report = DatasetLoader::default().validate(&df).unwrap();
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, ValidationWarning::ClassImbalance { .. })));
    }

    #[test]
    fn test_save_csv_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interim").join("out.csv");
        let mut df = df!("a" => &[1i64, 2, 3], "b" => &["x", "y", "z"]).unwrap();

        save_csv(&mut df, &path).unwrap();

        let loaded = DatasetLoader::default().load(&path).unwrap();
        assert_eq!(loaded.height(), 3);
        assert_eq!(loaded.width(), 2);
    }
}
