//! Prediction result types and the categorical decoders applied to them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Errors raised while evaluating a model or decoding its output.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Feature count mismatch: got {got}, expected {expected}")]
    FeatureCount { got: usize, expected: usize },

    #[error("Malformed estimator: {0}")]
    Malformed(String),

    #[error("Unknown label code {code} (encoder has {n_classes} classes)")]
    UnknownLabel { code: i64, n_classes: usize },
}

/// Maps encoded class codes back to their labels (code = index).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

impl LabelEncoder {
    #[must_use]
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    /// Decode a class code.
    ///
    /// # Errors
    /// Returns `ModelError::UnknownLabel` if the code was never fitted.
    pub fn inverse_transform(&self, code: i64) -> Result<&str, ModelError> {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.classes.get(i))
            .map(String::as_str)
            .ok_or(ModelError::UnknownLabel {
                code,
                n_classes: self.classes.len(),
            })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Literal trigger day, or the "not available" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerDay {
    Day(u32),
    NotAvailable,
}

impl std::fmt::Display for TriggerDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Day(d) => write!(f, "{d}"),
            Self::NotAvailable => write!(f, "N/A"),
        }
    }
}

/// Precomputed trigger class → day lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerDayTable {
    days: BTreeMap<i64, u32>,
}

impl TriggerDayTable {
    #[must_use]
    pub fn new(days: BTreeMap<i64, u32>) -> Self {
        Self { days }
    }

    /// Day for a predicted class; unknown classes give `NotAvailable`.
    #[must_use]
    pub fn resolve(&self, class: i64) -> TriggerDay {
        self.days
            .get(&class)
            .copied()
            .map_or(TriggerDay::NotAvailable, TriggerDay::Day)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.days.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// The six independent model outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Recommended Gn starting dose (IU)
    pub starting_dose: f64,
    /// Recommended drug type
    pub drug_type: String,
    /// Recommended stimulation protocol
    pub protocol: String,
    /// Predicted total Gn dose (IU)
    pub total_dose: f64,
    /// Predicted total Gn days
    pub total_days: f64,
    /// Raw trigger-day class from the classifier
    pub trigger_class: i64,
    /// Trigger class resolved through the lookup table
    pub trigger_day: TriggerDay,
}

impl PredictionResult {
    /// Human-readable result block, one line per output.
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        vec![
            format!("Recommended Gn starting dose: {:.0} IU", self.starting_dose),
            format!("Recommended drug type: {}", self.drug_type),
            format!("Recommended protocol: {}", self.protocol),
            format!("Predicted total Gn dose: {:.0} IU", self.total_dose),
            format!("Predicted total Gn days: {:.1} days", self.total_days),
            format!(
                "Recommended trigger day: Day {} (class {})",
                self.trigger_day, self.trigger_class
            ),
        ]
    }
}
