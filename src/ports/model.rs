//! Model ports: traits for the pre-trained estimators.
//!
//! The application only sees positional feature slices going in and a scalar
//! or class code coming out. How the model is stored or evaluated is an adapter
//! concern.

use crate::domain::ModelError;

/// A fitted regression model.
pub trait Regressor: Send + Sync {
    /// Number of positional features the model was fitted on.
    fn n_features(&self) -> usize;

    /// Predict a single row.
    ///
    /// # Errors
    /// Returns `ModelError::FeatureCount` if `x` has the wrong length, or
    /// `ModelError::Malformed` if the model cannot be evaluated.
    fn predict(&self, x: &[f64]) -> Result<f64, ModelError>;
}

/// A fitted classification model.
pub trait Classifier: Send + Sync {
    /// Number of positional features the model was fitted on.
    fn n_features(&self) -> usize;

    /// Class codes the model can emit.
    fn classes(&self) -> &[i64];

    /// Predict the class code of a single row.
    ///
    /// # Errors
    /// Returns `ModelError::FeatureCount` if `x` has the wrong length, or
    /// `ModelError::Malformed` if the model cannot be evaluated.
    fn predict(&self, x: &[f64]) -> Result<i64, ModelError>;
}

/// Reject rows whose width differs from what the model was fitted on.
///
/// # Errors
/// Returns `ModelError::FeatureCount` on mismatch.
pub fn check_width(x: &[f64], expected: usize) -> Result<(), ModelError> {
    if x.len() == expected {
        Ok(())
    } else {
        Err(ModelError::FeatureCount {
            got: x.len(),
            expected,
        })
    }
}
