//! Candidate roster and the registry that turns it into unfitted models

use super::decision_tree::{Criterion, DecisionTree};
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::knn::{DistanceMetric, KNNClassifier, KNNConfig, WeightScheme};
use super::linear_models::LogisticRegression;
use super::models::{ClassifierKind, ClassifierModel};
use super::random_forest::{MaxFeatures, RandomForest};
use crate::error::{FraudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Optional hyperparameters for one candidate; unset fields keep the model default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_state: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_estimators: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_samples_split: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_samples_leaf: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criterion: Option<Criterion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_features: Option<MaxFeatures>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subsample: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_neighbors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<WeightScheme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<DistanceMetric>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iter: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
}

impl CandidateParams {
    pub fn seeded(seed: u64) -> Self {
        Self {
            random_state: Some(seed),
            ..Default::default()
        }
    }
}

/// One roster entry: display name, registry key and overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub params: CandidateParams,
}

impl CandidateSpec {
    pub fn new(name: impl Into<String>, kind: ClassifierKind) -> Self {
        Self {
            name: name.into(),
            kind: kind.as_str().to_string(),
            params: CandidateParams::default(),
        }
    }

    pub fn with_params(mut self, params: CandidateParams) -> Self {
        self.params = params;
        self
    }

    /// Seed the candidate with `seed` unless it sets its own `random_state`
    pub fn with_default_seed(mut self, seed: u64) -> Self {
        self.params.random_state.get_or_insert(seed);
        self
    }
}

/// The five-model roster, in evaluation order
///
/// Seeds are left unset so the evaluation seed reaches every seeded model.
pub fn default_roster() -> Vec<CandidateSpec> {
    vec![
        CandidateSpec::new("Logistic Regression", ClassifierKind::LogisticRegression),
        CandidateSpec::new("Gradient Boosting", ClassifierKind::GradientBoosting),
        CandidateSpec::new("k-Neighbors Classifier", ClassifierKind::KNeighbors),
        CandidateSpec::new("Decision Tree Classifier", ClassifierKind::DecisionTree),
        CandidateSpec::new("Random Forest Classifier", ClassifierKind::RandomForest),
    ]
}

/// Builds an unfitted model from candidate parameters
pub type ModelConstructor = fn(&CandidateParams) -> ClassifierModel;

fn build_logistic_regression(params: &CandidateParams) -> ClassifierModel {
    let mut model = LogisticRegression::new();
    if let Some(max_iter) = params.max_iter {
        model = model.with_max_iter(max_iter);
    }
    if let Some(alpha) = params.alpha {
        model = model.with_alpha(alpha);
    }
    if let Some(lr) = params.learning_rate {
        model = model.with_learning_rate(lr);
    }
    ClassifierModel::LogisticRegression(model)
}

fn build_gradient_boosting(params: &CandidateParams) -> ClassifierModel {
    let defaults = GradientBoostingConfig::default();
    let config = GradientBoostingConfig {
        n_estimators: params.n_estimators.unwrap_or(defaults.n_estimators),
        learning_rate: params.learning_rate.unwrap_or(defaults.learning_rate),
        max_depth: params.max_depth.unwrap_or(defaults.max_depth),
        min_samples_leaf: params.min_samples_leaf.unwrap_or(defaults.min_samples_leaf),
        subsample: params.subsample.unwrap_or(defaults.subsample),
        random_state: params.random_state.or(defaults.random_state),
        ..defaults
    };
    ClassifierModel::GradientBoosting(GradientBoostingClassifier::new(config))
}

fn build_k_neighbors(params: &CandidateParams) -> ClassifierModel {
    let defaults = KNNConfig::default();
    ClassifierModel::KNeighbors(KNNClassifier::new(KNNConfig {
        n_neighbors: params.n_neighbors.unwrap_or(defaults.n_neighbors),
        weights: params.weights.unwrap_or(defaults.weights),
        metric: params.metric.unwrap_or(defaults.metric),
    }))
}

fn build_decision_tree(params: &CandidateParams) -> ClassifierModel {
    let mut tree = DecisionTree::new();
    tree.max_depth = params.max_depth;
    tree.random_state = params.random_state;
    if let Some(min) = params.min_samples_split {
        tree = tree.with_min_samples_split(min);
    }
    if let Some(min) = params.min_samples_leaf {
        tree = tree.with_min_samples_leaf(min);
    }
    if let Some(criterion) = params.criterion {
        tree = tree.with_criterion(criterion);
    }
    ClassifierModel::DecisionTree(tree)
}

fn build_random_forest(params: &CandidateParams) -> ClassifierModel {
    let mut forest = RandomForest::new(params.n_estimators.unwrap_or(100));
    forest.max_depth = params.max_depth;
    forest.random_state = params.random_state;
    if let Some(min) = params.min_samples_split {
        forest = forest.with_min_samples_split(min);
    }
    if let Some(min) = params.min_samples_leaf {
        forest = forest.with_min_samples_leaf(min);
    }
    if let Some(criterion) = params.criterion {
        forest.criterion = criterion;
    }
    if let Some(max_features) = params.max_features {
        forest = forest.with_max_features(max_features);
    }
    if let Some(bootstrap) = params.bootstrap {
        forest = forest.with_bootstrap(bootstrap);
    }
    ClassifierModel::RandomForest(forest)
}

/// Maps model-kind keys to constructors
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    constructors: BTreeMap<String, ModelConstructor>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ClassifierKind::LogisticRegression.as_str(), build_logistic_regression);
        registry.register(ClassifierKind::GradientBoosting.as_str(), build_gradient_boosting);
        registry.register(ClassifierKind::KNeighbors.as_str(), build_k_neighbors);
        registry.register(ClassifierKind::DecisionTree.as_str(), build_decision_tree);
        registry.register(ClassifierKind::RandomForest.as_str(), build_random_forest);
        registry
    }
}

impl ModelRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Add or replace the constructor for `kind`
    pub fn register(&mut self, kind: impl Into<String>, constructor: ModelConstructor) {
        self.constructors.insert(kind.into(), constructor);
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn build(&self, spec: &CandidateSpec) -> Result<ClassifierModel> {
        let constructor = self.constructors.get(&spec.kind).ok_or_else(|| {
            FraudError::modelling(format!(
                "Unknown model kind '{}' (known: {})",
                spec.kind,
                self.kinds().collect::<Vec<_>>().join(", ")
            ))
            .for_candidate(&spec.name)
        })?;
        Ok(constructor(&spec.params))
    }

    /// Build every roster entry in order; names must be unique
    pub fn resolve(&self, roster: &[CandidateSpec]) -> Result<Vec<(String, ClassifierModel)>> {
        if roster.is_empty() {
            return Err(FraudError::modelling("Candidate roster is empty"));
        }
        let mut seen = HashSet::new();
        roster
            .iter()
            .map(|spec| {
                if !seen.insert(spec.name.as_str()) {
                    return Err(FraudError::modelling("Duplicate candidate name in roster").for_candidate(&spec.name));
                }
                Ok((spec.name.clone(), self.build(spec)?))
            })
            .collect()
    }
}
