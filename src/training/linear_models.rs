//! Logistic regression

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::models::{check_feature_count, check_training_input, unique_classes, Classifier, ModelError, Result};

/// Logistic regression for binary classification.
///
/// Features are standardized with statistics from the training data before
/// batch gradient descent; those statistics are part of the fitted model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients (standardized feature space)
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Whether to fit intercept
    pub fit_intercept: bool,
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
    feature_mean: Option<Array1<f64>>,
    feature_scale: Option<Array1<f64>>,
    classes: Vec<f64>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            feature_mean: None,
            feature_scale: None,
            classes: Vec::new(),
        }
    }

    /// Set regularization strength
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    fn standardize(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (Some(mean), Some(scale)) = (&self.feature_mean, &self.feature_scale) else {
            return Err(ModelError::NotFitted);
        };
        Ok((x - mean) / scale)
    }

    fn fit_gd(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_input(x, y)?;
        let classes = unique_classes(y);
        if classes.len() > 2 {
            return Err(ModelError::InvalidInput(format!(
                "logistic regression is binary, found {} classes",
                classes.len()
            )));
        }
        let positive = classes[classes.len() - 1];
        let targets: Array1<f64> = y.mapv(|v| if classes.len() == 2 && v == positive { 1.0 } else { 0.0 });

        let n_samples = x.nrows();
        let mean = x.mean_axis(Axis(0)).ok_or(ModelError::InvalidInput("empty feature matrix".to_string()))?;
        // Constant columns keep a unit scale
        let scale = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 1e-12 { s } else { 1.0 });
        self.feature_mean = Some(mean);
        self.feature_scale = Some(scale);
        let xs = self.standardize(x)?;

        let mut weights = Array1::zeros(x.ncols());
        let mut bias = 0.0;
        let lr = self.learning_rate;
        let alpha = self.alpha;

        for _ in 0..self.max_iter {
            let predictions = Self::sigmoid(&(xs.dot(&weights) + bias));
            let errors = &predictions - &targets;
            let dw = (xs.t().dot(&errors) / n_samples as f64) + (alpha * &weights);
            let db = if self.fit_intercept { errors.mean().unwrap_or(0.0) } else { 0.0 };

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights = weights - lr * dw;
            bias -= lr * db;
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        self.classes = classes;
        Ok(())
    }

    /// Probability of the larger class label
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(ModelError::NotFitted)?;
        check_feature_count(x, coefficients.len())?;
        let intercept = self.intercept.unwrap_or(0.0);

        let xs = self.standardize(x)?;
        Ok(Self::sigmoid(&(xs.dot(coefficients) + intercept)))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        let negative = self.classes[0];
        let positive = self.classes[self.classes.len() - 1];
        Ok(proba.mapv(|p| if p > 0.5 { positive } else { negative }))
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_gd(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LogisticRegression::predict(self, x)
    }

    fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_logistic_regression() {
        let x = array![[1.0, 1.0], [1.5, 2.0], [2.0, 1.5], [5.0, 5.0], [5.5, 6.0], [6.0, 5.5]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new().with_max_iter(500);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_unscaled_features_still_converge() {
        // Balances in the millions next to a 0/1 flag
        let x = array![
            [1_000_000.0, 0.0],
            [2_000_000.0, 1.0],
            [3_000_000.0, 0.0],
            [9_000_000.0, 0.0],
            [8_000_000.0, 1.0],
            [7_500_000.0, 0.0]
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| p.is_finite()));
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_constant_column_is_harmless() {
        let x = array![[0.0, 3.0], [1.0, 3.0], [2.0, 3.0], [3.0, 3.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LogisticRegression::new();
        assert_eq!(model.predict_proba(&array![[1.0]]).unwrap_err(), ModelError::NotFitted);
    }
}
