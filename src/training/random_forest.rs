//! Random Forest classifier

use super::decision_tree::{Criterion, DecisionTree};
use super::models::{argmax_first, check_feature_count, check_training_input, unique_classes, Classifier, ModelError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (sqrt by default)
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    pub criterion: Criterion,
    /// Random state
    pub random_state: Option<u64>,
    n_features: usize,
    classes: Vec<f64>,
}

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            classes: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).floor() as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }

    fn fit_forest(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_input(x, y)?;
        if self.n_estimators == 0 {
            return Err(ModelError::InvalidInput("n_estimators must be at least 1".to_string()));
        }

        let n_samples = x.nrows();
        self.n_features = x.ncols();
        self.classes = unique_classes(y);
        let max_features = self.compute_max_features(self.n_features);
        let base_seed = self.random_state.unwrap_or(0);

        // One independent RNG per tree keeps the forest identical however rayon schedules it
        let trees: Result<Vec<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let mut tree = DecisionTree::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_criterion(self.criterion)
                    .with_random_state(rng.gen());
                tree.max_depth = self.max_depth;

                if self.bootstrap {
                    let sample_indices: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                    let x_boot = x.select(Axis(0), &sample_indices);
                    let y_boot: Array1<f64> = sample_indices.iter().map(|&i| y[i]).collect();
                    tree.fit(&x_boot, &y_boot)?;
                } else {
                    tree.fit(x, y)?;
                }
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        Ok(())
    }

    /// Per-class share of tree votes, columns in sorted class order
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        check_feature_count(x, self.n_features)?;

        let all_predictions: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        let mut proba = Array2::zeros((x.nrows(), self.classes.len()));
        for preds in &all_predictions {
            for (i, label) in preds.iter().enumerate() {
                let class_idx = self.classes.partition_point(|c| c < label);
                if class_idx < self.classes.len() {
                    proba[[i, class_idx]] += 1.0;
                }
            }
        }
        proba /= self.trees.len() as f64;
        Ok(proba)
    }

    /// Majority vote; ties go to the smaller class label
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| self.classes[argmax_first(&row.to_vec())])
            .collect())
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_forest(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForest::predict(self, x)
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_clusters() -> (Array2<f64>, Array1<f64>) {
        let x = array![[0.0, 0.0], [0.1, 0.1], [0.2, 0.2], [1.0, 1.0], [1.1, 1.1], [1.2, 1.2]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_classifier() {
        let (x, y) = two_clusters();
        let mut rf = RandomForest::new(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let accuracy = predictions.iter().zip(y.iter()).filter(|(p, a)| p == a).count() as f64 / y.len() as f64;
        assert!(accuracy >= 0.8, "Accuracy too low: {}", accuracy);
        assert_eq!(rf.n_trees(), 10);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let x = Array2::from_shape_fn((60, 4), |(i, j)| ((i * 31 + j * 17) % 23) as f64);
        let y = Array1::from_shape_fn(60, |i| ((i * 31) % 23 > 11) as u8 as f64);

        let mut a = RandomForest::new(15).with_random_state(3);
        let mut b = RandomForest::new(15).with_random_state(3);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let (x, y) = two_clusters();
        let mut rf = RandomForest::new(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (6, 2));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_max_features_strategies() {
        let rf = RandomForest::new(1);
        assert_eq!(rf.compute_max_features(16), 4);
        assert_eq!(rf.clone().with_max_features(MaxFeatures::Log2).compute_max_features(16), 4);
        assert_eq!(rf.clone().with_max_features(MaxFeatures::Fraction(0.5)).compute_max_features(16), 8);
        assert_eq!(rf.clone().with_max_features(MaxFeatures::Fixed(40)).compute_max_features(16), 16);
        assert_eq!(rf.with_max_features(MaxFeatures::All).compute_max_features(1), 1);
    }

    #[test]
    fn test_without_bootstrap_all_features_trees_agree() {
        let x = Array2::from_shape_fn((60, 4), |(i, j)| ((i * 31 + j * 17) % 23) as f64);
        let y = Array1::from_shape_fn(60, |i| ((i * 31) % 23 > 11) as u8 as f64);

        let mut rf = RandomForest::new(5)
            .with_max_features(MaxFeatures::All)
            .with_bootstrap(false)
            .with_random_state(1);
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|&p| p == 0.0 || p == 1.0));
    }

    #[test]
    fn test_unfitted() {
        let rf = RandomForest::default();
        assert_eq!(rf.predict(&array![[0.0]]).unwrap_err(), ModelError::NotFitted);
    }
}
