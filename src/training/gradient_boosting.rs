//! Gradient boosting for binary classification
//!
//! Each round fits a shallow regression tree to the log-loss gradient and
//! adds its Newton-step leaf values, shrunk by the learning rate, to the
//! running log-odds of every training row. Rows and columns are subsampled
//! per round.

use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::models::{check_feature_count, check_training_input, unique_classes, Classifier, ModelError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Subsample ratio for each tree
    pub subsample: f64,
    /// Column subsample ratio
    pub colsample_bytree: f64,
    /// L2 regularization on leaf values
    pub reg_lambda: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 0.8,
            colsample_bytree: 0.8,
            reg_lambda: 1.0,
            random_state: Some(42),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum RegressionNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<RegressionNode>,
        right: Box<RegressionNode>,
    },
}

impl RegressionNode {
    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                RegressionNode::Leaf { value } => return *value,
                RegressionNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => node = if row[*feature] <= *threshold { left } else { right },
            }
        }
    }
}

/// Inputs shared by every node while one boosting tree is grown
struct GrowContext<'a> {
    x: &'a Array2<f64>,
    gradients: &'a [f64],
    hessians: &'a [f64],
    features: &'a [usize],
    config: &'a GradientBoostingConfig,
}

impl GrowContext<'_> {
    fn grow(&self, indices: &[usize], depth: usize) -> RegressionNode {
        let leaf = || {
            let g: f64 = indices.iter().map(|&i| self.gradients[i]).sum();
            let h: f64 = indices.iter().map(|&i| self.hessians[i]).sum();
            RegressionNode::Leaf {
                value: g / (h + self.config.reg_lambda).max(1e-12),
            }
        };

        if depth >= self.config.max_depth || indices.len() < 2 * self.config.min_samples_leaf.max(1) {
            return leaf();
        }

        let best = self
            .features
            .par_iter()
            .map(|&feature| self.best_split(indices, feature))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .fold(None, |best: Option<(usize, f64, f64)>, candidate| match best {
                Some(b) if b.2 >= candidate.2 => Some(b),
                _ => Some(candidate),
            });

        let Some((feature, threshold, _)) = best else {
            return leaf();
        };

        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| self.x[[i, feature]] <= threshold);
        RegressionNode::Split {
            feature,
            threshold,
            left: Box::new(self.grow(&left, depth + 1)),
            right: Box::new(self.grow(&right, depth + 1)),
        }
    }

    /// Best squared-error reduction on one feature, as (feature, threshold, gain)
    fn best_split(&self, indices: &[usize], feature: usize) -> Option<(usize, f64, f64)> {
        let n = indices.len();
        let mut rows: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| (self.x[[i, feature]], self.gradients[i]))
            .collect();
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total: f64 = rows.iter().map(|r| r.1).sum();
        let base = total * total / n as f64;
        let min_leaf = self.config.min_samples_leaf.max(1);

        let mut left_sum = 0.0;
        let mut best: Option<(usize, f64, f64)> = None;
        for i in 0..n - 1 {
            left_sum += rows[i].1;
            if rows[i].0 >= rows[i + 1].0 {
                continue;
            }
            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64 - base;
            if gain > best.map_or(1e-12, |b| b.2) {
                best = Some((feature, (rows[i].0 + rows[i + 1].0) / 2.0, gain));
            }
        }
        best
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Gradient Boosting Classifier (binary)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<RegressionNode>,
    initial_log_odds: f64,
    classes: Vec<f64>,
    n_features: usize,
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_log_odds: 0.0,
            classes: Vec::new(),
            n_features: 0,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    fn fit_boosting(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_input(x, y)?;
        if !(self.config.subsample > 0.0 && self.config.subsample <= 1.0)
            || !(self.config.colsample_bytree > 0.0 && self.config.colsample_bytree <= 1.0)
        {
            return Err(ModelError::InvalidInput(
                "subsample and colsample_bytree must lie in (0, 1]".to_string(),
            ));
        }

        let classes = unique_classes(y);
        if classes.len() > 2 {
            return Err(ModelError::InvalidInput(format!(
                "gradient boosting is binary, found {} classes",
                classes.len()
            )));
        }
        let positive = classes.last().copied().unwrap_or(1.0);
        let targets: Vec<f64> = y.iter().map(|&v| if classes.len() == 2 && v == positive { 1.0 } else { 0.0 }).collect();

        let n_samples = x.nrows();
        let n_features = x.ncols();

        // Prior log-odds, clamped so a single-class target stays finite
        let p = (targets.iter().sum::<f64>() / n_samples as f64).clamp(1e-10, 1.0 - 1e-10);
        self.initial_log_odds = (p / (1.0 - p)).ln();
        let mut log_odds = vec![self.initial_log_odds; n_samples];

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut trees = Vec::with_capacity(self.config.n_estimators);

        for _ in 0..self.config.n_estimators {
            let probs: Vec<f64> = log_odds.iter().map(|&lo| sigmoid(lo)).collect();
            let gradients: Vec<f64> = targets.iter().zip(&probs).map(|(t, p)| t - p).collect();
            let hessians: Vec<f64> = probs.iter().map(|p| p * (1.0 - p)).collect();

            let rows = sample_indices(n_samples, self.config.subsample, &mut rng);
            let features = sample_indices(n_features, self.config.colsample_bytree, &mut rng);

            let ctx = GrowContext {
                x,
                gradients: &gradients,
                hessians: &hessians,
                features: &features,
                config: &self.config,
            };
            let tree = ctx.grow(&rows, 0);

            for (lo, row) in log_odds.iter_mut().zip(x.rows()) {
                *lo += self.config.learning_rate * tree.predict_row(row);
            }
            trees.push(tree);
        }

        self.trees = trees;
        self.classes = classes;
        self.n_features = n_features;
        Ok(())
    }

    /// Probability of the larger class label
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.classes.is_empty() {
            return Err(ModelError::NotFitted);
        }
        check_feature_count(x, self.n_features)?;

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let lo = self.trees.iter().fold(self.initial_log_odds, |acc, tree| {
                    acc + self.config.learning_rate * tree.predict_row(row)
                });
                sigmoid(lo)
            })
            .collect())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        let negative = self.classes[0];
        let positive = self.classes[self.classes.len() - 1];
        Ok(probs.mapv(|p| if p > 0.5 { positive } else { negative }))
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Sorted random subset holding `ceil(n * ratio)` of `0..n`
fn sample_indices(n: usize, ratio: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
    let sample_size = (((n as f64) * ratio).ceil() as usize).clamp(1.min(n), n);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(sample_size);
    indices.sort_unstable();
    indices
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_boosting(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        GradientBoostingClassifier::predict(self, x)
    }

    fn is_fitted(&self) -> bool {
        !self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((100, 2), (0..200).map(|i| i as f64 * 0.1).collect()).unwrap();
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| if row[0] + row[1] > 10.0 { 1.0 } else { 0.0 })
            .collect();
        (x, y)
    }

    #[test]
    fn test_gradient_boosting_classifier() {
        let (x, y) = create_classification_data();
        let config = GradientBoostingConfig {
            n_estimators: 20,
            max_depth: 3,
            ..Default::default()
        };

        let mut model = GradientBoostingClassifier::new(config);
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        let accuracy = predictions.iter().zip(y.iter()).filter(|(p, t)| p == t).count() as f64 / y.len() as f64;
        assert!(accuracy > 0.9, "Accuracy too low: {}", accuracy);
        assert_eq!(model.n_trees(), 20);
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (x, y) = create_classification_data();
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 5,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let probs = model.predict_proba(&x).unwrap();
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_seeded_fit_is_deterministic() {
        let (x, y) = create_classification_data();
        let config = GradientBoostingConfig {
            n_estimators: 10,
            random_state: Some(7),
            ..Default::default()
        };

        let mut a = GradientBoostingClassifier::new(config.clone());
        let mut b = GradientBoostingClassifier::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_single_class_target() {
        let x = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let y = Array1::zeros(4);

        let mut model = GradientBoostingClassifier::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), Array1::<f64>::zeros(4));
    }
}
