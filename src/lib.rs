//! Fraud Trainer - batch training pipeline for transaction fraud classifiers
//!
//! Loads a transaction table, imputes gaps, derives features, one-hot encodes
//! categoricals, fits a roster of classifiers on a seeded split and keeps the
//! most accurate one.
//!
//! # Modules
//!
//! - [`data`] - CSV loading and structural validation
//! - [`features`] - Imputation, derived columns and one-hot encoding
//! - [`training`] - Classifiers, metrics and the evaluation loop
//! - [`export`] - Saving and loading the selected model
//! - [`pipeline`] - Stage orchestration
//! - [`config`] - Layered configuration (defaults, TOML, environment)
//! - [`logging`] - Subscriber setup for the binary
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Pipeline stages
pub mod data;
pub mod features;
pub mod training;
pub mod export;
pub mod pipeline;

// Infrastructure
pub mod config;
pub mod logging;

// Services
pub mod cli;

pub use error::{FraudError, Result, Stage};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{FraudError, Result, Stage};

    // Configuration
    pub use crate::config::{DataConfig, EvaluationConfig, FeatureConfig, LoggingConfig, PipelineConfig};

    // Data
    pub use crate::data::{DatasetLoader, ValidationReport};

    // Features
    pub use crate::features::FeatureDeriver;

    // Training
    pub use crate::training::{
        default_roster, to_dataset, CandidateFailurePolicy, CandidateSpec, Classifier, ClassifierKind,
        ClassifierModel, Dataset, EvaluationReport, ModelEvaluator, ModelRegistry,
    };

    // Export
    pub use crate::export::{load_model, save_best, ModelMetadata, PersistedModel};

    // Pipeline
    pub use crate::pipeline::{run, PipelineSummary};
}
