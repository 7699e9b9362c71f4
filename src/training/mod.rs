//! Model training and selection
//!
//! Provides the evaluation loop for binary fraud classifiers:
//! - Seeded train/test split
//! - Logistic regression, gradient boosting, k-nearest neighbours
//! - Decision trees and random forests
//! - Accuracy, confusion matrix and per-class classification report
//! - A configurable roster resolved through [`ModelRegistry`]

mod dataset;
mod evaluation;
mod models;
mod registry;
mod split;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod metrics;
pub mod random_forest;

pub use dataset::{to_dataset, Dataset};
pub use evaluation::{
    Candidate, CandidateFailure, CandidateFailurePolicy, EvaluationReport, EvaluationResult, ModelEvaluator,
};
pub use models::{Classifier, ClassifierKind, ClassifierModel, ModelError};
pub use registry::{default_roster, CandidateParams, CandidateSpec, ModelConstructor, ModelRegistry};
pub use split::{train_test_split, TrainTestSplit};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use knn::{DistanceMetric, KNNClassifier, KNNConfig, WeightScheme};
pub use linear_models::LogisticRegression;
pub use metrics::{accuracy_score, AveragedMetrics, ClassMetrics, ClassificationReport, ConfusionMatrix};
pub use random_forest::{MaxFeatures, RandomForest};
