//! Classification scoring: accuracy, confusion matrix, per-class report

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::models::unique_classes;

/// Fraction of predictions equal to the true label; 0 for empty input
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Binary confusion matrix, rows = actual, columns = predicted:
/// `[[tn, fp], [fn, tp]]` with label 1 as the positive class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let mut cm = Self::default();
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            match (*t > 0.5, *p > 0.5) {
                (true, true) => cm.tp += 1,
                (false, true) => cm.fp += 1,
                (false, false) => cm.tn += 1,
                (true, false) => cm.fn_ += 1,
            }
        }
        cm
    }

    pub fn as_array(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.as_array().iter().flatten().map(|v| v.to_string().len()).max().unwrap_or(1);
        write!(
            f,
            "[[{:>w$} {:>w$}]\n [{:>w$} {:>w$}]]",
            self.tn,
            self.fp,
            self.fn_,
            self.tp,
            w = width
        )
    }
}

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Averaged precision, recall and F1
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AveragedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

/// Per-class metrics with accuracy, macro and support-weighted averages.
/// Undefined ratios (no predictions or no support) are reported as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AveragedMetrics,
    pub weighted_avg: AveragedMetrics,
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationReport {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let observed: Array1<f64> = y_true.iter().chain(y_pred.iter()).copied().collect();
        let labels = unique_classes(&observed);
        let support_total = y_true.len();

        let classes: Vec<ClassMetrics> = labels
            .iter()
            .map(|&label| {
                let mut tp = 0;
                let mut predicted = 0;
                let mut actual = 0;
                for (t, p) in y_true.iter().zip(y_pred.iter()) {
                    let is_true = *t == label;
                    let is_pred = *p == label;
                    actual += usize::from(is_true);
                    predicted += usize::from(is_pred);
                    tp += usize::from(is_true && is_pred);
                }
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, actual);
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label,
                    precision,
                    recall,
                    f1_score,
                    support: actual,
                }
            })
            .collect();

        let n_classes = classes.len().max(1) as f64;
        let macro_avg = AveragedMetrics {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n_classes,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n_classes,
            f1_score: classes.iter().map(|c| c.f1_score).sum::<f64>() / n_classes,
        };

        let weighted = |metric: fn(&ClassMetrics) -> f64| {
            if support_total == 0 {
                0.0
            } else {
                classes.iter().map(|c| metric(c) * c.support as f64).sum::<f64>() / support_total as f64
            }
        };
        let weighted_avg = AveragedMetrics {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1_score: weighted(|c| c.f1_score),
        };

        Self {
            accuracy: accuracy_score(y_true, y_pred),
            classes,
            macro_avg,
            weighted_avg,
            support: support_total,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for class in &self.classes {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                class.label, class.precision, class.recall, class.f1_score, class.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{:>14} {:>9} {:>9} {:>9.2} {:>9}", "accuracy", "", "", self.accuracy, self.support)?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1_score, self.support
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accuracy() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        assert_eq!(accuracy_score(&y_true, &y_pred), 0.75);
        assert_eq!(accuracy_score(&Array1::zeros(0), &Array1::zeros(0)), 0.0);
    }

    #[test]
    fn test_confusion_matrix() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        let cm = ConfusionMatrix::compute(&y_true, &y_pred);

        assert_eq!(cm.as_array(), [[3, 1], [1, 3]]);
        assert_eq!(cm.total(), 8);
        assert_eq!(cm.to_string(), "[[3 1]\n [1 3]]");
    }

    #[test]
    fn test_classification_report() {
        let y_true = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0];
        let y_pred = array![0.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        let report = ClassificationReport::compute(&y_true, &y_pred);

        assert_eq!(report.classes.len(), 2);
        let legit = &report.classes[0];
        assert_eq!(legit.support, 4);
        assert_eq!(legit.precision, 0.75);
        assert_eq!(legit.recall, 0.75);

        let fraud = &report.classes[1];
        assert_eq!(fraud.precision, 0.5);
        assert_eq!(fraud.recall, 0.5);
        assert!((report.macro_avg.f1_score - 0.625).abs() < 1e-12);
        assert!((report.weighted_avg.recall - 4.0 / 6.0).abs() < 1e-12);

        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("weighted avg"));
    }

    #[test]
    fn test_report_without_positive_predictions() {
        let y_true = array![0.0, 0.0, 1.0];
        let y_pred = array![0.0, 0.0, 0.0];
        let report = ClassificationReport::compute(&y_true, &y_pred);

        assert_eq!(report.classes[1].precision, 0.0);
        assert_eq!(report.classes[1].f1_score, 0.0);
    }
}
