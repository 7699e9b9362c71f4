//! K-Nearest Neighbors classifier
//!
//! Lazy learner: fitting stores the reference rows, prediction votes among
//! the k closest of them. Equal distances are ordered by training row so
//! the result does not depend on scheduling.

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::models::{argmax_first, check_feature_count, check_training_input, unique_classes, Classifier, ModelError, Result};

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// KNN configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    pub metric: DistanceMetric,
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-Nearest Neighbors Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    /// Class index of every reference row
    y_train: Vec<usize>,
    classes: Vec<f64>,
}

impl Default for KNNClassifier {
    fn default() -> Self {
        Self::new(KNNConfig::default())
    }
}

impl KNNClassifier {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: Vec::new(),
            classes: Vec::new(),
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &KNNConfig {
        &self.config
    }

    fn store(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_input(x, y)?;
        if self.config.n_neighbors == 0 {
            return Err(ModelError::InvalidInput("n_neighbors must be at least 1".to_string()));
        }
        if let DistanceMetric::Minkowski(p) = self.config.metric {
            if p < 1.0 {
                return Err(ModelError::InvalidInput(format!("Minkowski p must be >= 1, got {}", p)));
            }
        }

        self.classes = unique_classes(y);
        self.y_train = y.iter().map(|v| self.classes.partition_point(|c| c < v)).collect();
        self.x_train = Some(x.clone());
        Ok(())
    }

    /// Weighted class shares among the k nearest rows, columns in class order
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let x_train = self.x_train.as_ref().ok_or(ModelError::NotFitted)?;
        check_feature_count(x, x_train.ncols())?;
        let n_classes = self.classes.len();

        let rows: Vec<Vec<f64>> = x
            .outer_iter()
            .into_par_iter()
            .map(|row| {
                let neighbors = find_k_nearest(row, x_train, self.config.n_neighbors, self.config.metric);
                let mut votes = class_votes(&neighbors, &self.y_train, n_classes, self.config.weights);
                let total: f64 = votes.iter().sum();
                if total > 0.0 {
                    votes.iter_mut().for_each(|v| *v /= total);
                }
                votes
            })
            .collect();

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Array2::from_shape_vec((x.nrows(), n_classes), flat).map_err(|e| ModelError::ShapeError {
            expected: format!("{} x {} probabilities", x.nrows(), n_classes),
            actual: e.to_string(),
        })
    }

    /// Predict class labels (parallelized over rows)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .outer_iter()
            .map(|row| self.classes[argmax_first(&row.to_vec())])
            .collect())
    }
}

impl Classifier for KNNClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.store(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        KNNClassifier::predict(self, x)
    }

    fn is_fitted(&self) -> bool {
        self.x_train.is_some()
    }
}

/// Heap entry ordered by distance, then by training row
#[derive(Debug, Clone, Copy)]
struct Neighbor {
    dist: f64,
    index: usize,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist.total_cmp(&other.dist).then(self.index.cmp(&other.index))
    }
}

/// k smallest distances via a bounded max-heap, O(n log k)
fn find_k_nearest(
    point: ArrayView1<'_, f64>,
    x_train: &Array2<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<Neighbor> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (index, row) in x_train.outer_iter().enumerate() {
        let candidate = Neighbor {
            dist: compute_distance(point, row, metric),
            index,
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().map_or(false, |top| candidate < *top) {
            heap.pop();
            heap.push(candidate);
        }
    }

    heap.into_sorted_vec()
}

fn compute_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>, metric: DistanceMetric) -> f64 {
    let diffs = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs());
    match metric {
        DistanceMetric::Euclidean => diffs.map(|d| d * d).sum::<f64>().sqrt(),
        DistanceMetric::Manhattan => diffs.sum(),
        DistanceMetric::Minkowski(p) => diffs.map(|d| d.powf(p)).sum::<f64>().powf(1.0 / p),
    }
}

/// Vote mass per class index. With distance weighting an exact match
/// outvotes everything else.
fn class_votes(neighbors: &[Neighbor], labels: &[usize], n_classes: usize, weights: WeightScheme) -> Vec<f64> {
    let mut votes = vec![0.0; n_classes];
    let exact = weights == WeightScheme::Distance && neighbors.iter().any(|n| n.dist == 0.0);

    for neighbor in neighbors {
        let weight = match weights {
            WeightScheme::Uniform => 1.0,
            WeightScheme::Distance if exact => {
                if neighbor.dist == 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            WeightScheme::Distance => 1.0 / neighbor.dist,
        };
        votes[labels[neighbor.index]] += weight;
    }
    votes
}
