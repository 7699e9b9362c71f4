//! End-to-end runs: load, validate, derive features, evaluate, persist

use crate::config::PipelineConfig;
use crate::data::{save_csv, DatasetLoader, ValidationReport};
use crate::error::Result;
use crate::export::{save_best, ModelMetadata};
use crate::features::FeatureDeriver;
use crate::training::{to_dataset, ModelEvaluator};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Per-candidate line of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    pub name: String,
    pub accuracy: f64,
}

/// What a successful training run produced
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub best: ModelMetadata,
    pub model_path: PathBuf,
    /// Roster order
    pub scores: Vec<CandidateScore>,
    /// Candidates skipped after a failure, with the error text
    pub skipped: Vec<(String, String)>,
    pub validation: ValidationReport,
    pub n_train: usize,
    pub n_test: usize,
    pub elapsed_secs: f64,
}

/// Load, validate and derive features; returns the engineered table
pub fn engineer_features(config: &PipelineConfig, input: &Path) -> Result<(DataFrame, ValidationReport)> {
    let loader = DatasetLoader::new(&config.data);
    let raw = loader.load(input)?;
    let validation = loader.validate(&raw)?;
    let engineered = FeatureDeriver::new(config.features.clone()).process(&raw)?;
    Ok((engineered, validation))
}

/// Run feature derivation only and write the engineered table as CSV
pub fn export_features(config: &PipelineConfig, input: &Path, output: &Path) -> Result<DataFrame> {
    let (mut engineered, _) = engineer_features(config, input)?;
    save_csv(&mut engineered, output)?;
    info!(path = %output.display(), "Engineered features saved");
    Ok(engineered)
}

/// Full training run. Nothing is written to `output` unless every stage succeeds.
pub fn run(config: &PipelineConfig, input: &Path, output: &Path) -> Result<PipelineSummary> {
    let start = Instant::now();
    info!(input = %input.display(), output = %output.display(), "Pipeline started");

    let (engineered, validation) = engineer_features(config, input)?;
    let dataset = to_dataset(&engineered, &config.data.target_column)?;
    let report = ModelEvaluator::new(config.evaluation.clone()).evaluate_dataset(&dataset)?;
    let best = save_best(&report, output)?;

    let summary = PipelineSummary {
        scores: report
            .results()
            .iter()
            .map(|r| CandidateScore {
                name: r.name().to_string(),
                accuracy: r.accuracy(),
            })
            .collect(),
        skipped: report
            .failures()
            .iter()
            .map(|f| (f.name.clone(), f.error.to_string()))
            .collect(),
        best,
        model_path: output.to_path_buf(),
        validation,
        n_train: report.n_train(),
        n_test: report.n_test(),
        elapsed_secs: start.elapsed().as_secs_f64(),
    };

    info!(
        candidate = %summary.best.name,
        accuracy = summary.best.accuracy,
        elapsed_secs = summary.elapsed_secs,
        "Pipeline finished"
    );
    Ok(summary)
}
