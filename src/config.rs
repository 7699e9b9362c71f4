//! Configuration for the training pipeline
//!
//! Defaults reproduce the reference fraud dataset layout. A TOML file and
//! `FRAUD__`-prefixed environment variables (e.g.
//! `FRAUD__EVALUATION__TEST_FRACTION=0.3`) are layered on top.

use crate::training::{CandidateFailurePolicy, CandidateSpec};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Dataset loading and validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Column that must exist and be numeric
    pub amount_column: String,
    /// Binary label column
    pub target_column: String,
    /// Rows scanned for schema inference
    pub infer_schema_rows: usize,
    /// Minority share below which an imbalance warning is raised
    pub imbalance_warning_ratio: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            amount_column: "amount".to_string(),
            target_column: "isFraud".to_string(),
            infer_schema_rows: 1000,
            imbalance_warning_ratio: 0.1,
        }
    }
}

/// Before/after columns of one account balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancePair {
    pub before: String,
    pub after: String,
    /// Name of the derived difference column
    pub output: String,
}

/// Feature derivation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub date_column: String,
    /// chrono format string for the date column
    pub date_format: String,
    pub amount_column: String,
    pub origin_balance: BalancePair,
    pub destination_balance: BalancePair,
    /// Removed after derivation; absent names are skipped
    pub drop_columns: Vec<String>,
    /// One-hot encoded with the first category dropped
    pub categorical_columns: Vec<String>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            date_column: "Date of transaction".to_string(),
            date_format: "%d/%m/%Y".to_string(),
            amount_column: "amount".to_string(),
            origin_balance: BalancePair {
                before: "oldbalanceOrg".to_string(),
                after: "newbalanceOrig".to_string(),
                output: "orig_balance_diff".to_string(),
            },
            destination_balance: BalancePair {
                before: "oldbalanceDest".to_string(),
                after: "newbalanceDest".to_string(),
                output: "dest_balance_diff".to_string(),
            },
            drop_columns: ["Unnamed: 0", "nameOrig", "nameDest", "Date of transaction", "Time of day"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            categorical_columns: ["type", "branch", "Acct type"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Model evaluation loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Share of rows held out for scoring, in (0, 1)
    pub test_fraction: f64,
    /// Seed for the split and for seeded models
    pub random_state: u64,
    /// Train roster candidates concurrently
    pub parallel: bool,
    #[serde(default)]
    pub on_failure: CandidateFailurePolicy,
    /// Ordered roster of candidates
    pub roster: Vec<CandidateSpec>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            random_state: 42,
            parallel: false,
            on_failure: CandidateFailurePolicy::default(),
            roster: crate::training::default_roster(),
        }
    }
}

impl EvaluationConfig {
    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_roster(mut self, roster: Vec<CandidateSpec>) -> Self {
        self.roster = roster;
        self
    }

    pub fn with_failure_policy(mut self, policy: CandidateFailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    pub level: String,
    /// Directory holding the log file, created on startup
    pub directory: PathBuf,
    pub file_name: String,
    /// Mirror events to stderr
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: PathBuf::from("artifacts"),
            file_name: "fraud_detection.log".to_string(),
            console: true,
        }
    }
}

impl LoggingConfig {
    pub fn file_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

impl PipelineConfig {
    /// Load defaults, then the optional TOML file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&PipelineConfig::default()).context("Failed to encode default configuration")?,
        );

        if let Some(path) = path {
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(Environment::with_prefix("FRAUD").prefix_separator("__").separator("__").try_parsing(true))
            .build()
            .context("Failed to build configuration")?;

        config.try_deserialize().context("Failed to deserialize configuration")
    }
}
