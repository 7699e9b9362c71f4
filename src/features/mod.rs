//! Feature derivation
//!
//! Turns the raw transaction table into a model-ready one:
//!
//! 1. [`impute_missing`] fills gaps with the column median or mode
//! 2. [`derive_features`] adds weekday, log amount and balance differences
//! 3. [`drop_columns`] removes identifiers and raw date/time text
//! 4. [`encode_categorical`] one-hot encodes the categorical columns
//!
//! [`FeatureDeriver::process`] runs all four with the configured columns.

mod derive;
mod encoding;
mod imputation;

pub use derive::{derive_features, drop_columns, DAY_OF_WEEK, LOG_AMOUNT};
pub use encoding::encode_categorical;
pub use imputation::impute_missing;

use crate::config::FeatureConfig;
use crate::error::Result;
use polars::prelude::DataFrame;
use tracing::info;

/// Configured chain of feature steps
#[derive(Debug, Clone, Default)]
pub struct FeatureDeriver {
    config: FeatureConfig,
}

impl FeatureDeriver {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Impute, derive, drop and encode
    pub fn process(&self, df: &DataFrame) -> Result<DataFrame> {
        let imputed = impute_missing(df)?;
        let derived = derive_features(&imputed, &self.config)?;
        let trimmed = drop_columns(&derived, &self.config.drop_columns)?;
        let encoded = encode_categorical(&trimmed, &self.config.categorical_columns)?;
        info!(rows = encoded.height(), columns = encoded.width(), "Feature derivation finished");
        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn raw_table(n: usize) -> DataFrame {
        let amount: Vec<Option<f64>> = (0..n).map(|i| if i == 3 { None } else { Some(i as f64 * 10.0) }).collect();
        let old_org: Vec<f64> = (0..n).map(|i| 1000.0 + i as f64).collect();
        let new_org: Vec<f64> = (0..n).map(|i| 900.0 + i as f64).collect();
        let old_dest: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let new_dest: Vec<f64> = (0..n).map(|i| 2.0 * i as f64).collect();
        let dates: Vec<String> = (0..n).map(|i| format!("{:02}/10/2024", i % 28 + 1)).collect();
        let times: Vec<&str> = (0..n).map(|_| "12:00").collect();
        let kinds: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "CASH_IN" } else { "TRANSFER" }).collect();
        let branches: Vec<&str> = (0..n).map(|i| ["Ikeja", "Lekki", "Yaba"][i % 3]).collect();
        let accounts: Vec<Option<&str>> = (0..n).map(|i| if i == 5 { None } else { Some("Savings") }).collect();
        let names: Vec<String> = (0..n).map(|i| format!("C{}", i)).collect();
        let labels: Vec<i64> = (0..n).map(|i| (i % 7 == 0) as i64).collect();

        df!(
            "Unnamed: 0" => (0..n as i64).collect::<Vec<_>>(),
            "amount" => amount,
            "nameOrig" => names.clone(),
            "oldbalanceOrg" => old_org,
            "newbalanceOrig" => new_org,
            "nameDest" => names,
            "oldbalanceDest" => old_dest,
            "newbalanceDest" => new_dest,
            "Date of transaction" => dates,
            "Time of day" => times,
            "type" => kinds,
            "branch" => branches,
            "Acct type" => accounts,
            "isFraud" => labels
        )
        .unwrap()
    }

    #[test]
    fn test_process_full_chain() {
        let deriver = FeatureDeriver::default();
        let result = deriver.process(&raw_table(100)).unwrap();

        assert_eq!(result.height(), 100);
        for dropped in ["Unnamed: 0", "nameOrig", "nameDest", "Date of transaction", "Time of day", "type"] {
            assert!(result.column(dropped).is_err(), "{} should be gone", dropped);
        }
        // 2 types -> 1 indicator, 3 branches -> 2, single account type -> none
        assert!(result.column("type_TRANSFER").is_ok());
        assert!(result.column("branch_Lekki").is_ok());
        assert!(result.column("branch_Yaba").is_ok());
        assert_eq!(result.get_columns().iter().filter(|c| c.name().starts_with("Acct type_")).count(), 0);

        for derived in [DAY_OF_WEEK, LOG_AMOUNT, "orig_balance_diff", "dest_balance_diff"] {
            assert_eq!(result.column(derived).unwrap().null_count(), 0);
        }
    }

    #[test]
    fn test_two_category_type_adds_one_column() {
        let raw = raw_table(100);
        let result = FeatureDeriver::default().process(&raw).unwrap();
        let type_columns = result
            .get_columns()
            .iter()
            .filter(|c| c.name().starts_with("type_"))
            .count();
        assert_eq!(type_columns, 1);
    }
}
