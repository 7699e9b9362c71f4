//! CART decision tree classifier

use super::models::{
    argmax_first, check_feature_count, check_training_input, unique_classes, Classifier, ModelError, Result,
};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with the predicted class label
    Leaf { value: f64, n_samples: usize },
    /// Internal node; rows with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    #[default]
    Gini,
    Entropy,
}

impl Criterion {
    fn impurity(self, counts: impl Iterator<Item = usize>, n: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let n = n as f64;
        match self {
            Criterion::Gini => 1.0 - counts.map(|c| (c as f64 / n).powi(2)).sum::<f64>(),
            Criterion::Entropy => -counts
                .filter(|&c| c > 0)
                .map(|c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
        }
    }
}

/// Decision tree classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth (unlimited when `None`)
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at random per node (all when `None`)
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    /// Seed for the per-node feature draw
    pub random_state: Option<u64>,
    n_features: usize,
    classes: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct BuildContext<'a> {
    x: &'a Array2<f64>,
    labels: &'a [usize],
    n_classes: usize,
    rng: ChaCha8Rng,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
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

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn fit_tree(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_input(x, y)?;
        if self.min_samples_leaf == 0 {
            return Err(ModelError::InvalidInput("min_samples_leaf must be at least 1".to_string()));
        }

        self.classes = unique_classes(y);
        let labels: Vec<usize> = y
            .iter()
            .map(|v| self.classes.partition_point(|c| c < v))
            .collect();

        self.n_features = x.ncols();
        let mut ctx = BuildContext {
            x,
            labels: &labels,
            n_classes: self.classes.len(),
            rng: ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0)),
        };

        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.root = Some(self.build_node(&mut ctx, &indices, 0));
        Ok(())
    }

    fn class_counts(&self, ctx: &BuildContext<'_>, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; ctx.n_classes];
        for &i in indices {
            counts[ctx.labels[i]] += 1;
        }
        counts
    }

    fn build_node(&self, ctx: &mut BuildContext<'_>, indices: &[usize], depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let counts = self.class_counts(ctx, indices);
        let leaf = TreeNode::Leaf {
            value: self.classes[argmax_first(&counts)],
            n_samples,
        };

        let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if is_pure
            || n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
        {
            return leaf;
        }

        let parent_impurity = self.criterion.impurity(counts.iter().copied(), n_samples);
        let features = self.candidate_features(&mut ctx.rng);
        let Some(best) = self.find_best_split(ctx, indices, &features, &counts, parent_impurity) else {
            return leaf;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| ctx.x[[i, best.feature]] <= best.threshold);

        let left = Box::new(self.build_node(ctx, &left_indices, depth + 1));
        let right = Box::new(self.build_node(ctx, &right_indices, depth + 1));

        TreeNode::Split {
            feature_idx: best.feature,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity: parent_impurity,
        }
    }

    /// Features examined at one node, in ascending order
    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut chosen = index::sample(rng, self.n_features, k.max(1)).into_vec();
                chosen.sort_unstable();
                chosen
            }
            _ => (0..self.n_features).collect(),
        }
    }

    fn find_best_split(
        &self,
        ctx: &BuildContext<'_>,
        indices: &[usize],
        features: &[usize],
        counts: &[usize],
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let x = ctx.x;
        let labels = ctx.labels;

        // Each feature is scanned independently; collect keeps feature order
        let per_feature: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature| self.best_split_for_feature(x, labels, indices, feature, counts, parent_impurity))
            .collect();

        per_feature.into_iter().flatten().fold(None, |best, candidate| match best {
            Some(b) if b.gain >= candidate.gain => Some(b),
            _ => Some(candidate),
        })
    }

    /// Sort rows by the feature and sweep every boundary between distinct values
    fn best_split_for_feature(
        &self,
        x: &Array2<f64>,
        labels: &[usize],
        indices: &[usize],
        feature: usize,
        totals: &[usize],
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let mut rows: Vec<(f64, usize)> = indices.iter().map(|&i| (x[[i, feature]], labels[i])).collect();
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left = vec![0usize; totals.len()];
        let mut best: Option<SplitCandidate> = None;

        for i in 0..n - 1 {
            left[rows[i].1] += 1;
            if rows[i].0 >= rows[i + 1].0 {
                continue;
            }

            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                continue;
            }

            let left_impurity = self.criterion.impurity(left.iter().copied(), n_left);
            let right_impurity = self
                .criterion
                .impurity(totals.iter().zip(&left).map(|(t, l)| t - l), n_right);
            let weighted = (n_left as f64 * left_impurity + n_right as f64 * right_impurity) / n as f64;
            let gain = parent_impurity - weighted;

            if gain > best.map_or(0.0, |b| b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: (rows[i].0 + rows[i + 1].0) / 2.0,
                    gain,
                });
            }
        }

        best
    }

    fn predict_row(node: &TreeNode, row: ArrayView1<'_, f64>) -> f64 {
        let mut node = node;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(ModelError::NotFitted)?;
        check_feature_count(x, self.n_features)?;
        Ok(x.rows().into_iter().map(|row| Self::predict_row(root, row)).collect())
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }

    pub fn n_leaves(&self) -> usize {
        fn count(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => count(left) + count(right),
            }
        }
        self.root.as_ref().map_or(0, count)
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_tree(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        DecisionTree::predict(self, x)
    }

    fn is_fitted(&self) -> bool {
        self.root.is_some()
    }
}
