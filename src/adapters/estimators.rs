//! Estimators exported by the training pipeline, evaluated in-process.
//!
//! Each model file is a JSON object tagged by `kind`. Tree ensembles use the
//! scikit-learn node-array layout (`children_left`, `children_right`,
//! `feature`, `threshold`, `value`; a child of -1 marks a leaf).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::ModelError;
use crate::ports::{check_width, Classifier, Regressor};

/// Any estimator the artifact directory may contain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportedEstimator {
    LinearRegressor(LinearRegressor),
    LinearClassifier(LinearClassifier),
    TreeEnsembleRegressor(TreeEnsembleRegressor),
    TreeEnsembleClassifier(TreeEnsembleClassifier),
}

impl ExportedEstimator {
    /// Column names in the order the model was fitted on.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        match self {
            Self::LinearRegressor(m) => &m.feature_names,
            Self::LinearClassifier(m) => &m.feature_names,
            Self::TreeEnsembleRegressor(m) => &m.feature_names,
            Self::TreeEnsembleClassifier(m) => &m.feature_names,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LinearRegressor(_) => "linear_regressor",
            Self::LinearClassifier(_) => "linear_classifier",
            Self::TreeEnsembleRegressor(_) => "tree_ensemble_regressor",
            Self::TreeEnsembleClassifier(_) => "tree_ensemble_classifier",
        }
    }

    /// Validate and wrap as a regressor.
    ///
    /// # Errors
    /// Returns `ModelError::Malformed` if the parameters are inconsistent or
    /// the estimator is a classifier.
    pub fn into_regressor(self) -> Result<Arc<dyn Regressor>, ModelError> {
        match self {
            Self::LinearRegressor(m) => {
                m.validate()?;
                Ok(Arc::new(m))
            }
            Self::TreeEnsembleRegressor(m) => {
                m.validate()?;
                Ok(Arc::new(m))
            }
            other => Err(ModelError::Malformed(format!(
                "expected a regressor, found {}",
                other.kind()
            ))),
        }
    }

    /// Validate and wrap as a classifier.
    ///
    /// # Errors
    /// Returns `ModelError::Malformed` if the parameters are inconsistent or
    /// the estimator is a regressor.
    pub fn into_classifier(self) -> Result<Arc<dyn Classifier>, ModelError> {
        match self {
            Self::LinearClassifier(m) => {
                m.validate()?;
                Ok(Arc::new(m))
            }
            Self::TreeEnsembleClassifier(m) => {
                m.validate()?;
                Ok(Arc::new(m))
            }
            other => Err(ModelError::Malformed(format!(
                "expected a classifier, found {}",
                other.kind()
            ))),
        }
    }
}

fn malformed(msg: impl Into<String>) -> ModelError {
    ModelError::Malformed(msg.into())
}

fn dot(w: &[f64], x: &[f64]) -> f64 {
    w.iter().zip(x).map(|(a, b)| a * b).sum()
}

/// Index of the first maximum.
fn argmax(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &s) in scores.iter().enumerate() {
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
}

/// Ordinary linear regression: `w·x + b`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegressor {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegressor {
    fn validate(&self) -> Result<(), ModelError> {
        if self.coefficients.len() != self.feature_names.len() {
            return Err(malformed(format!(
                "{} coefficients for {} features",
                self.coefficients.len(),
                self.feature_names.len()
            )));
        }
        Ok(())
    }
}

impl Regressor for LinearRegressor {
    fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
        check_width(x, self.n_features())?;
        Ok(dot(&self.coefficients, x) + self.intercept)
    }
}

/// Linear decision function per class.
///
/// With two classes and a single coefficient row, a positive decision selects
/// `classes[1]`; otherwise the class with the largest decision wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearClassifier {
    pub feature_names: Vec<String>,
    pub classes: Vec<i64>,
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

impl LinearClassifier {
    fn is_binary(&self) -> bool {
        self.classes.len() == 2 && self.coefficients.len() == 1
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.classes.len() < 2 {
            return Err(malformed("classifier needs at least two classes"));
        }
        let rows = if self.is_binary() { 1 } else { self.classes.len() };
        if self.coefficients.len() != rows || self.intercepts.len() != rows {
            return Err(malformed(format!(
                "expected {rows} coefficient rows and intercepts, got {} and {}",
                self.coefficients.len(),
                self.intercepts.len()
            )));
        }
        if let Some(row) = self
            .coefficients
            .iter()
            .find(|r| r.len() != self.feature_names.len())
        {
            return Err(malformed(format!(
                "coefficient row of width {} for {} features",
                row.len(),
                self.feature_names.len()
            )));
        }
        Ok(())
    }
}

impl Classifier for LinearClassifier {
    fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn predict(&self, x: &[f64]) -> Result<i64, ModelError> {
        check_width(x, self.n_features())?;

        let decisions: Vec<f64> = self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(w, b)| dot(w, x) + b)
            .collect();

        let idx = if self.is_binary() {
            usize::from(decisions[0] > 0.0)
        } else {
            argmax(&decisions).ok_or_else(|| malformed("no decision values"))?
        };
        Ok(self.classes[idx])
    }
}

/// A single decision tree in node-array form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

impl ExportedTree {
    /// Check that every path from the root reaches a leaf of `value_width`.
    fn validate(&self, n_features: usize, value_width: usize) -> Result<(), ModelError> {
        let n = self.children_left.len();
        if n == 0 {
            return Err(malformed("empty tree"));
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|&len| len != n)
        {
            return Err(malformed("tree arrays differ in length"));
        }

        for node in 0..n {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left < 0 {
                if self.value[node].len() != value_width {
                    return Err(malformed(format!(
                        "leaf {node} has {} values, expected {value_width}",
                        self.value[node].len()
                    )));
                }
                continue;
            }
            // Children are stored after their parent, which rules out cycles.
            for child in [left, right] {
                if child <= node as i64 || child >= n as i64 {
                    return Err(malformed(format!("node {node} has invalid child {child}")));
                }
            }
            let f = self.feature[node];
            if f < 0 || f >= n_features as i64 {
                return Err(malformed(format!("node {node} splits on feature {f}")));
            }
        }
        Ok(())
    }

    /// Leaf values reached by `x`. The tree must have been validated.
    fn leaf(&self, x: &[f64]) -> &[f64] {
        let mut node = 0usize;
        loop {
            let left = self.children_left[node];
            if left < 0 {
                return &self.value[node];
            }
            let f = self.feature[node] as usize;
            node = if x[f] <= self.threshold[node] {
                left as usize
            } else {
                self.children_right[node] as usize
            };
        }
    }
}

/// Averaging ensemble of regression trees (random forest).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsembleRegressor {
    pub feature_names: Vec<String>,
    pub trees: Vec<ExportedTree>,
}

impl TreeEnsembleRegressor {
    fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(malformed("ensemble has no trees"));
        }
        for tree in &self.trees {
            tree.validate(self.feature_names.len(), 1)?;
        }
        Ok(())
    }
}

impl Regressor for TreeEnsembleRegressor {
    fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
        check_width(x, self.n_features())?;
        let sum: f64 = self.trees.iter().map(|t| t.leaf(x)[0]).sum();
        Ok(sum / self.trees.len() as f64)
    }
}

/// Soft-voting ensemble of classification trees (random forest).
///
/// Leaf values are per-class counts or fractions; each tree's leaf is
/// normalised before averaging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsembleClassifier {
    pub feature_names: Vec<String>,
    pub classes: Vec<i64>,
    pub trees: Vec<ExportedTree>,
}

impl TreeEnsembleClassifier {
    fn validate(&self) -> Result<(), ModelError> {
        if self.classes.is_empty() {
            return Err(malformed("classifier has no classes"));
        }
        if self.trees.is_empty() {
            return Err(malformed("ensemble has no trees"));
        }
        for tree in &self.trees {
            tree.validate(self.feature_names.len(), self.classes.len())?;
        }
        Ok(())
    }

    /// Mean class probabilities for one row.
    pub fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(x, self.feature_names.len())?;

        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let leaf = tree.leaf(x);
            let total: f64 = leaf.iter().sum();
            if total <= 0.0 {
                continue;
            }
            for (p, v) in proba.iter_mut().zip(leaf) {
                *p += v / total;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        Ok(proba)
    }
}

impl Classifier for TreeEnsembleClassifier {
    fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn predict(&self, x: &[f64]) -> Result<i64, ModelError> {
        let proba = self.predict_proba(x)?;
        let idx = argmax(&proba).ok_or_else(|| malformed("no class probabilities"))?;
        Ok(self.classes[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{i}")).collect()
    }

    /// Stump splitting on feature 0 at `threshold`.
    fn stump(threshold: f64, left: Vec<f64>, right: Vec<f64>) -> ExportedTree {
        ExportedTree {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![0, -2, -2],
            threshold: vec![threshold, -2.0, -2.0],
            value: vec![vec![0.0; left.len()], left, right],
        }
    }

    #[test]
    fn test_linear_regressor() {
        let m = LinearRegressor {
            feature_names: names(3),
            coefficients: vec![2.0, -1.0, 0.5],
            intercept: 10.0,
        };
        let r = ExportedEstimator::LinearRegressor(m).into_regressor().unwrap();
        assert!((r.predict(&[1.0, 2.0, 4.0]).unwrap() - 12.0).abs() < 1e-12);
        assert_eq!(
            r.predict(&[1.0]),
            Err(ModelError::FeatureCount { got: 1, expected: 3 })
        );
    }

    #[test]
    fn test_linear_classifier_binary_and_multiclass() {
        let binary = LinearClassifier {
            feature_names: names(1),
            classes: vec![0, 1],
            coefficients: vec![vec![1.0]],
            intercepts: vec![-5.0],
        };
        assert_eq!(binary.validate(), Ok(()));
        assert_eq!(binary.predict(&[4.0]).unwrap(), 0);
        assert_eq!(binary.predict(&[6.0]).unwrap(), 1);

        let multi = LinearClassifier {
            feature_names: names(2),
            classes: vec![10, 20, 30],
            coefficients: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.0, 0.0]],
            intercepts: vec![0.0, 0.0, 0.5],
        };
        assert_eq!(multi.validate(), Ok(()));
        assert_eq!(multi.predict(&[3.0, 1.0]).unwrap(), 10);
        assert_eq!(multi.predict(&[0.0, 2.0]).unwrap(), 20);
        assert_eq!(multi.predict(&[0.0, 0.0]).unwrap(), 30);
    }

    #[test]
    fn test_tree_regressor_averages_trees() {
        let m = TreeEnsembleRegressor {
            feature_names: names(2),
            trees: vec![
                stump(5.0, vec![100.0], vec![200.0]),
                stump(7.0, vec![150.0], vec![250.0]),
            ],
        };
        let r = ExportedEstimator::TreeEnsembleRegressor(m).into_regressor().unwrap();
        // x0 = 5 goes left in both (<=).
        assert!((r.predict(&[5.0, 0.0]).unwrap() - 125.0).abs() < 1e-12);
        assert!((r.predict(&[6.0, 0.0]).unwrap() - 175.0).abs() < 1e-12);
        assert!((r.predict(&[8.0, 0.0]).unwrap() - 225.0).abs() < 1e-12);
    }

    #[test]
    fn test_tree_classifier_soft_votes_with_counts() {
        let m = TreeEnsembleClassifier {
            feature_names: names(1),
            classes: vec![3, 4, 5],
            trees: vec![
                stump(1.0, vec![8.0, 2.0, 0.0], vec![0.0, 3.0, 7.0]),
                stump(2.0, vec![0.2, 0.8, 0.0], vec![0.0, 0.0, 1.0]),
            ],
        };
        assert_eq!(m.validate(), Ok(()));

        let proba = m.predict_proba(&[0.0]).unwrap();
        assert!((proba[0] - 0.5).abs() < 1e-12);
        assert!((proba[1] - 0.5).abs() < 1e-12);
        // Tie between classes 3 and 4: first maximum wins.
        assert_eq!(m.predict(&[0.0]).unwrap(), 3);
        assert_eq!(m.predict(&[1.5]).unwrap(), 4);
        assert_eq!(m.predict(&[3.0]).unwrap(), 5);
    }

    #[test]
    fn test_tree_validation_rejects_bad_structure() {
        let mut cyclic = stump(1.0, vec![1.0], vec![2.0]);
        cyclic.children_right[0] = 0;
        assert!(cyclic.validate(1, 1).is_err());

        let bad_feature = stump(1.0, vec![1.0], vec![2.0]);
        assert!(bad_feature.validate(0, 1).is_err());

        let mut ragged = stump(1.0, vec![1.0], vec![2.0]);
        ragged.threshold.pop();
        assert!(ragged.validate(1, 1).is_err());

        let wrong_width = stump(1.0, vec![1.0, 0.0], vec![2.0, 0.0]);
        assert!(wrong_width.validate(1, 1).is_err());
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let clf = ExportedEstimator::LinearClassifier(LinearClassifier {
            feature_names: names(1),
            classes: vec![0, 1],
            coefficients: vec![vec![1.0]],
            intercepts: vec![0.0],
        });
        assert!(clf.into_regressor().is_err());
    }

    #[test]
    fn test_estimator_json_is_tagged_by_kind() {
        let json = r#"{
            "kind": "linear_regressor",
            "feature_names": ["a", "b"],
            "coefficients": [1.0, 1.0],
            "intercept": 0.5
        }"#;
        let est: ExportedEstimator = serde_json::from_str(json).unwrap();
        assert_eq!(est.kind(), "linear_regressor");
        assert_eq!(est.feature_names(), ["a", "b"]);
    }
}
