//! Classifier trait, model errors and the closed set of supported models

use super::decision_tree::DecisionTree;
use super::gradient_boosting::GradientBoostingClassifier;
use super::knn::KNNClassifier;
use super::linear_models::LogisticRegression;
use super::random_forest::RandomForest;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised inside model fitting and prediction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("model not fitted")]
    NotFitted,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for model internals
pub type Result<T> = std::result::Result<T, ModelError>;

/// Binary classifier over a dense feature matrix
pub trait Classifier: Send + Sync {
    /// Fit on training rows; `y` holds class labels
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict a class label per row
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn is_fitted(&self) -> bool;
}

/// Reject empty inputs and row-count mismatches
pub(crate) fn check_training_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(ModelError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(ModelError::InvalidInput("cannot fit on zero rows".to_string()));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(ModelError::InvalidInput("training data contains NaN or infinite values".to_string()));
    }
    Ok(())
}

/// Reject prediction input whose width differs from the training data
pub(crate) fn check_feature_count(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(ModelError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Sorted distinct labels
pub(crate) fn unique_classes(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.iter().copied().collect();
    classes.sort_by(|a, b| a.total_cmp(b));
    classes.dedup();
    classes
}

/// Index of the largest count; the lowest index wins ties
pub(crate) fn argmax_first<T: PartialOrd + Copy>(values: &[T]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Model family keys used in configuration and persisted metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    LogisticRegression,
    GradientBoosting,
    KNeighbors,
    DecisionTree,
    RandomForest,
}

impl ClassifierKind {
    pub const ALL: [ClassifierKind; 5] = [
        ClassifierKind::LogisticRegression,
        ClassifierKind::GradientBoosting,
        ClassifierKind::KNeighbors,
        ClassifierKind::DecisionTree,
        ClassifierKind::RandomForest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierKind::LogisticRegression => "logistic_regression",
            ClassifierKind::GradientBoosting => "gradient_boosting",
            ClassifierKind::KNeighbors => "k_neighbors",
            ClassifierKind::DecisionTree => "decision_tree",
            ClassifierKind::RandomForest => "random_forest",
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassifierKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ModelError::InvalidInput(format!("unknown model kind '{}'", s)))
    }
}

/// One of the supported classifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassifierModel {
    LogisticRegression(LogisticRegression),
    GradientBoosting(GradientBoostingClassifier),
    KNeighbors(KNNClassifier),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
}

impl ClassifierModel {
    pub fn kind(&self) -> ClassifierKind {
        match self {
            ClassifierModel::LogisticRegression(_) => ClassifierKind::LogisticRegression,
            ClassifierModel::GradientBoosting(_) => ClassifierKind::GradientBoosting,
            ClassifierModel::KNeighbors(_) => ClassifierKind::KNeighbors,
            ClassifierModel::DecisionTree(_) => ClassifierKind::DecisionTree,
            ClassifierModel::RandomForest(_) => ClassifierKind::RandomForest,
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            ClassifierModel::LogisticRegression(m) => m,
            ClassifierModel::GradientBoosting(m) => m,
            ClassifierModel::KNeighbors(m) => m,
            ClassifierModel::DecisionTree(m) => m,
            ClassifierModel::RandomForest(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            ClassifierModel::LogisticRegression(m) => m,
            ClassifierModel::GradientBoosting(m) => m,
            ClassifierModel::KNeighbors(m) => m,
            ClassifierModel::DecisionTree(m) => m,
            ClassifierModel::RandomForest(m) => m,
        }
    }
}

impl Classifier for ClassifierModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }
}
