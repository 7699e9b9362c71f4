//! Model evaluation loop: split, fit every roster candidate, score, select

use super::dataset::Dataset;
use super::metrics::{accuracy_score, ClassificationReport, ConfusionMatrix};
use super::models::{Classifier, ClassifierModel};
use super::registry::{CandidateSpec, ModelRegistry};
use super::split::{train_test_split, TrainTestSplit};
use crate::config::EvaluationConfig;
use crate::error::{FraudError, Result};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info, warn};

/// What to do when a single candidate fails to fit or predict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateFailurePolicy {
    /// Fail the whole run
    #[default]
    Abort,
    /// Record the failure and keep evaluating the rest of the roster
    Skip,
}

/// A named, unfitted model from the roster
#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub model: ClassifierModel,
}

impl Candidate {
    pub fn new(name: impl Into<String>, model: ClassifierModel) -> Self {
        Self {
            name: name.into(),
            model,
        }
    }

    /// Fit on the training rows and score on the held-out rows
    pub fn fit_and_score(self, split: &TrainTestSplit) -> Result<EvaluationResult> {
        let Candidate { name, mut model } = self;
        let start = Instant::now();

        model.fit(&split.x_train, &split.y_train).map_err(|e| {
            FraudError::modelling("Model fitting failed")
                .for_candidate(&name)
                .with_source(e)
        })?;
        let y_pred = model.predict(&split.x_test).map_err(|e| {
            FraudError::modelling("Prediction on test set failed")
                .for_candidate(&name)
                .with_source(e)
        })?;

        let accuracy = accuracy_score(&split.y_test, &y_pred);
        let report = ClassificationReport::compute(&split.y_test, &y_pred);
        let confusion = ConfusionMatrix::compute(&split.y_test, &y_pred);
        let training_time_secs = start.elapsed().as_secs_f64();

        info!(candidate = %name, accuracy, training_time_secs, "{} Accuracy: {}", name, accuracy);
        info!(candidate = %name, "Classification Report:\n{}", report);
        info!(candidate = %name, "Confusion Matrix:\n{}", confusion);

        Ok(EvaluationResult {
            name,
            model,
            accuracy,
            report,
            confusion,
            training_time_secs,
        })
    }
}

/// A fitted candidate and its test-set scores
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    name: String,
    model: ClassifierModel,
    accuracy: f64,
    report: ClassificationReport,
    confusion: ConfusionMatrix,
    training_time_secs: f64,
}

impl EvaluationResult {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &ClassifierModel {
        &self.model
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn report(&self) -> &ClassificationReport {
        &self.report
    }

    pub fn confusion(&self) -> &ConfusionMatrix {
        &self.confusion
    }

    pub fn training_time_secs(&self) -> f64 {
        self.training_time_secs
    }

    pub fn into_model(self) -> ClassifierModel {
        self.model
    }
}

/// A candidate skipped under [`CandidateFailurePolicy::Skip`]
#[derive(Debug)]
pub struct CandidateFailure {
    pub name: String,
    pub error: FraudError,
}

/// Outcome of one evaluation run, results in roster order
#[derive(Debug)]
pub struct EvaluationReport {
    results: Vec<EvaluationResult>,
    failures: Vec<CandidateFailure>,
    n_train: usize,
    n_test: usize,
    feature_names: Vec<String>,
    target: String,
}

impl EvaluationReport {
    pub fn results(&self) -> &[EvaluationResult] {
        &self.results
    }

    pub fn get(&self, name: &str) -> Option<&EvaluationResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Highest accuracy; the earliest roster entry wins ties
    pub fn best(&self) -> Option<&EvaluationResult> {
        self.results
            .iter()
            .fold(None, |best: Option<&EvaluationResult>, r| match best {
                Some(b) if b.accuracy >= r.accuracy => Some(b),
                _ => Some(r),
            })
    }

    pub fn failures(&self) -> &[CandidateFailure] {
        &self.failures
    }

    pub fn n_train(&self) -> usize {
        self.n_train
    }

    pub fn n_test(&self) -> usize {
        self.n_test
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub(crate) fn with_schema(mut self, feature_names: Vec<String>, target: impl Into<String>) -> Self {
        self.feature_names = feature_names;
        self.target = target.into();
        self
    }
}

/// Trains and scores the configured roster on one seeded split
#[derive(Debug, Clone)]
pub struct ModelEvaluator {
    config: EvaluationConfig,
    registry: ModelRegistry,
}

impl ModelEvaluator {
    pub fn new(config: EvaluationConfig) -> Self {
        Self {
            config,
            registry: ModelRegistry::default(),
        }
    }

    pub fn with_registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Evaluate every roster candidate on `x`/`y` with 0/1 labels
    pub fn evaluate(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<EvaluationReport> {
        if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(FraudError::modelling(format!("Target must hold 0/1 labels, found {}", bad)));
        }

        // Candidates without their own seed follow the evaluation seed
        let roster: Vec<CandidateSpec> = self
            .config
            .roster
            .iter()
            .cloned()
            .map(|spec| spec.with_default_seed(self.config.random_state))
            .collect();

        // Unknown kinds and duplicate names fail before any work is done
        let candidates: Vec<Candidate> = self
            .registry
            .resolve(&roster)?
            .into_iter()
            .map(|(name, model)| Candidate::new(name, model))
            .collect();

        let split = train_test_split(x, y, self.config.test_fraction, self.config.random_state)?;
        info!(
            train_rows = split.n_train(),
            test_rows = split.n_test(),
            candidates = candidates.len(),
            parallel = self.config.parallel,
            "Starting model evaluation"
        );

        let outcomes = self.fit_candidates(candidates, &split);

        let mut results = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(err) => match self.config.on_failure {
                    CandidateFailurePolicy::Abort => {
                        error!(candidate = %name, error = %err, "Candidate failed, aborting evaluation");
                        return Err(err);
                    }
                    CandidateFailurePolicy::Skip => {
                        warn!(candidate = %name, error = %err, "Candidate failed, skipping");
                        failures.push(CandidateFailure { name, error: err });
                    }
                },
            }
        }

        if results.is_empty() {
            return Err(FraudError::modelling(format!(
                "Every candidate failed ({} attempted)",
                failures.len()
            )));
        }

        let report = EvaluationReport {
            results,
            failures,
            n_train: split.n_train(),
            n_test: split.n_test(),
            feature_names: Vec::new(),
            target: String::new(),
        };
        if let Some(best) = report.best() {
            info!(candidate = %best.name, accuracy = best.accuracy, "Best model selected");
        }
        Ok(report)
    }

    /// Fit and score in roster order; a sequential run under `Abort` stops at the first failure
    fn fit_candidates(&self, candidates: Vec<Candidate>, split: &TrainTestSplit) -> Vec<(String, Result<EvaluationResult>)> {
        // Ordered collect keeps roster order in both modes
        if self.config.parallel {
            return candidates
                .into_par_iter()
                .map(|c| (c.name.clone(), c.fit_and_score(split)))
                .collect();
        }

        let mut outcomes = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let name = candidate.name.clone();
            let outcome = candidate.fit_and_score(split);
            let stop = outcome.is_err() && self.config.on_failure == CandidateFailurePolicy::Abort;
            outcomes.push((name, outcome));
            if stop {
                break;
            }
        }
        outcomes
    }

    /// Evaluate a prepared dataset, keeping its schema for persistence
    pub fn evaluate_dataset(&self, dataset: &Dataset) -> Result<EvaluationReport> {
        let report = self.evaluate(&dataset.x, &dataset.y)?;
        Ok(report.with_schema(dataset.feature_names.clone(), dataset.target.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use crate::training::models::ClassifierKind;
    use crate::training::registry::{default_roster, CandidateParams, CandidateSpec};
    use crate::training::RandomForest;

    /// Two well separated clusters with a 30% positive rate
    fn separable(n: usize) -> (Array2<f64>, Array1<f64>) {
        let y = Array1::from_shape_fn(n, |i| if i % 10 < 3 { 1.0 } else { 0.0 });
        let x = Array2::from_shape_fn((n, 3), |(i, j)| {
            let base = if y[i] == 1.0 { 10.0 } else { 0.0 };
            base + ((i * 7 + j * 3) % 5) as f64 * 0.3
        });
        (x, y)
    }

    fn quick_roster() -> Vec<CandidateSpec> {
        let mut roster = default_roster();
        for spec in &mut roster {
            spec.params.n_estimators = Some(10);
        }
        roster
    }

    #[test]
    fn test_evaluate_default_roster() {
        let (x, y) = separable(100);
        let evaluator = ModelEvaluator::new(EvaluationConfig::default().with_roster(quick_roster()));
        let report = evaluator.evaluate(&x, &y).unwrap();

        assert_eq!(report.n_train(), 80);
        assert_eq!(report.n_test(), 20);
        let names: Vec<&str> = report.results().iter().map(|r| r.name()).collect();
        assert_eq!(names[0], "Logistic Regression");
        assert_eq!(names.len(), 5);

        for result in report.results() {
            assert!((0.0..=1.0).contains(&result.accuracy()));
            assert_eq!(result.confusion().total(), 20);
            assert!(result.model().is_fitted());
        }

        let best = report.best().unwrap();
        let max = report.results().iter().map(|r| r.accuracy()).fold(f64::MIN, f64::max);
        assert_eq!(best.accuracy(), max);
        assert!(names.contains(&best.name()));
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let (x, y) = separable(60);
        let evaluator = ModelEvaluator::new(EvaluationConfig::default().with_roster(quick_roster()));
        let a = evaluator.evaluate(&x, &y).unwrap();
        let b = evaluator.evaluate(&x, &y).unwrap();

        for (ra, rb) in a.results().iter().zip(b.results()) {
            assert_eq!(ra.name(), rb.name());
            assert_eq!(ra.accuracy(), rb.accuracy());
            assert_eq!(ra.confusion(), rb.confusion());
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (x, y) = separable(60);
        let config = EvaluationConfig::default().with_roster(quick_roster());
        let sequential = ModelEvaluator::new(config.clone()).evaluate(&x, &y).unwrap();
        let parallel = ModelEvaluator::new(config.with_parallel(true)).evaluate(&x, &y).unwrap();

        let seq: Vec<(&str, f64)> = sequential.results().iter().map(|r| (r.name(), r.accuracy())).collect();
        let par: Vec<(&str, f64)> = parallel.results().iter().map(|r| (r.name(), r.accuracy())).collect();
        assert_eq!(seq, par);
    }

    #[test]
    fn test_ties_go_to_earlier_candidate() {
        let (x, y) = separable(50);
        let spec = |name: &str| {
            CandidateSpec::new(name, ClassifierKind::DecisionTree).with_params(CandidateParams::seeded(42))
        };
        let config = EvaluationConfig::default().with_roster(vec![spec("first"), spec("second")]);
        let report = ModelEvaluator::new(config).evaluate(&x, &y).unwrap();

        assert_eq!(report.results()[0].accuracy(), report.results()[1].accuracy());
        assert_eq!(report.best().unwrap().name(), "first");
    }

    fn failing_forest(_: &CandidateParams) -> ClassifierModel {
        // Zero trees cannot be fitted
        ClassifierModel::RandomForest(RandomForest::new(0))
    }

    fn registry_with_failure() -> ModelRegistry {
        let mut registry = ModelRegistry::default();
        registry.register("broken", failing_forest);
        registry
    }

    fn roster_with_failure() -> Vec<CandidateSpec> {
        vec![
            CandidateSpec::new("Decision Tree Classifier", ClassifierKind::DecisionTree),
            CandidateSpec {
                name: "Broken".to_string(),
                kind: "broken".to_string(),
                params: CandidateParams::default(),
            },
        ]
    }

    #[test]
    fn test_candidate_failure_aborts_by_default() {
        let (x, y) = separable(40);
        let evaluator = ModelEvaluator::new(EvaluationConfig::default().with_roster(roster_with_failure()))
            .with_registry(registry_with_failure());

        let err = evaluator.evaluate(&x, &y).unwrap_err();
        assert_eq!(err.stage(), Stage::Modelling);
        assert_eq!(err.candidate(), Some("Broken"));
    }

    #[test]
    fn test_sequential_abort_stops_at_first_failure() {
        let (x, y) = separable(40);
        let mut roster = roster_with_failure();
        roster.reverse();
        let evaluator = ModelEvaluator::new(EvaluationConfig::default().with_roster(roster.clone()))
            .with_registry(registry_with_failure());

        let candidates: Vec<Candidate> = evaluator
            .registry
            .resolve(&roster)
            .unwrap()
            .into_iter()
            .map(|(name, model)| Candidate::new(name, model))
            .collect();
        let split = train_test_split(&x, &y, 0.2, 42).unwrap();
        let outcomes = evaluator.fit_candidates(candidates, &split);

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, "Broken");
        assert!(outcomes[0].1.is_err());
    }

    #[test]
    fn test_evaluation_seed_reaches_seeded_models() {
        let (x, y) = separable(60);
        let mut roster = quick_roster();
        roster.push(
            CandidateSpec::new("Pinned Tree", ClassifierKind::DecisionTree).with_params(CandidateParams::seeded(3)),
        );
        let config = EvaluationConfig::default().with_roster(roster).with_random_state(7);
        let report = ModelEvaluator::new(config).evaluate(&x, &y).unwrap();

        let seed_of = |name: &str| match report.get(name).unwrap().model() {
            ClassifierModel::GradientBoosting(m) => m.config().random_state,
            ClassifierModel::DecisionTree(m) => m.random_state,
            ClassifierModel::RandomForest(m) => m.random_state,
            other => panic!("{:?} is not seeded", other.kind()),
        };
        assert_eq!(seed_of("Gradient Boosting"), Some(7));
        assert_eq!(seed_of("Decision Tree Classifier"), Some(7));
        assert_eq!(seed_of("Random Forest Classifier"), Some(7));
        assert_eq!(seed_of("Pinned Tree"), Some(3));
    }

    #[test]
    fn test_skip_policy_keeps_going() {
        let (x, y) = separable(40);
        let config = EvaluationConfig::default()
            .with_roster(roster_with_failure())
            .with_failure_policy(CandidateFailurePolicy::Skip);
        let report = ModelEvaluator::new(config)
            .with_registry(registry_with_failure())
            .evaluate(&x, &y)
            .unwrap();

        assert_eq!(report.results().len(), 1);
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.failures()[0].name, "Broken");
        assert_eq!(report.best().unwrap().name(), "Decision Tree Classifier");
    }

    #[test]
    fn test_non_binary_target_rejected() {
        let (x, mut y) = separable(20);
        y[3] = 2.0;
        let err = ModelEvaluator::new(EvaluationConfig::default()).evaluate(&x, &y).unwrap_err();
        assert_eq!(err.stage(), Stage::Modelling);
    }

    #[test]
    fn test_empty_roster_rejected() {
        let (x, y) = separable(20);
        let config = EvaluationConfig::default().with_roster(Vec::new());
        assert!(ModelEvaluator::new(config).evaluate(&x, &y).is_err());
    }
}
