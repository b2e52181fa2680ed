//! Clinical feature definitions and fixed-order feature assembly.
//!
//! The keys below are the training column names. Models consume positional
//! arrays, so `CORE_FEATURES` and `DYNAMIC_FEATURES` must stay in the order the
//! models were fitted with.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named model input column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSpec {
    /// Training column name (also the batch-input key)
    pub key: &'static str,
    /// English label for display
    pub label: &'static str,
    /// Unit hint for display
    pub unit: &'static str,
}

const fn spec(key: &'static str, label: &'static str, unit: &'static str) -> FeatureSpec {
    FeatureSpec { key, label, unit }
}

/// Baseline features, in model order.
pub const CORE_FEATURES: [FeatureSpec; 10] = [
    spec("年龄", "Age", "years"),
    spec("体重指数", "BMI", "kg/m²"),
    spec("(基础内分泌)FSH", "Baseline FSH", "IU/L"),
    spec("(基础内分泌)E2", "Baseline E2", "pg/mL"),
    spec("(基础内分泌)PRL", "Baseline PRL", "ng/mL"),
    spec("(基础内分泌)LH", "Baseline LH", "IU/L"),
    spec("(基础内分泌)T", "Baseline T", "ng/dL"),
    spec("(基础内分泌)AMH", "Baseline AMH", "ng/mL"),
    spec("左窦卵泡数", "Left AFC", "count"),
    spec("右窦卵泡数", "Right AFC", "count"),
];

/// Monitoring-round features, in model order.
pub const DYNAMIC_FEATURES: [FeatureSpec; 18] = [
    spec("血E2_1", "E2 (round 1)", "pg/mL"),
    spec("血LH_1", "LH (round 1)", "IU/L"),
    spec("血FSH_1", "FSH (round 1)", "IU/L"),
    spec("血P_1", "P (round 1)", "ng/mL"),
    spec("Day_1", "Day (round 1)", "day"),
    spec("血E2_2", "E2 (round 2)", "pg/mL"),
    spec("血LH_2", "LH (round 2)", "IU/L"),
    spec("血FSH_2", "FSH (round 2)", "IU/L"),
    spec("血P_2", "P (round 2)", "ng/mL"),
    spec("Day_2", "Day (round 2)", "day"),
    spec("血E2_3", "E2 (round 3)", "pg/mL"),
    spec("血LH_3", "LH (round 3)", "IU/L"),
    spec("血FSH_3", "FSH (round 3)", "IU/L"),
    spec("血P_3", "P (round 3)", "ng/mL"),
    spec("Day_3", "Day (round 3)", "day"),
    spec("最大卵泡测定日3", "Max follicle measurement day 3", "day"),
    spec("左侧最大卵泡直径3", "Left max follicle diameter 3", "mm"),
    spec("右侧最大卵巢直径3", "Right max follicle diameter 3", "mm"),
];

/// Number of monitoring rounds collected.
pub const MONITORING_ROUNDS: usize = 3;

/// Baseline E2 column.
pub const BASELINE_E2_KEY: &str = "(基础内分泌)E2";

/// Per-round E2 columns, indexed by round - 1.
pub const ROUND_E2_KEYS: [&str; MONITORING_ROUNDS] = ["血E2_1", "血E2_2", "血E2_3"];

/// Order in which the baseline fields are shown on the form.
/// Has no effect on model input.
pub const CORE_DISPLAY_ORDER: [&str; 10] = [
    "年龄",
    "体重指数",
    "(基础内分泌)FSH",
    "(基础内分泌)LH",
    "(基础内分泌)PRL",
    "(基础内分泌)E2",
    "(基础内分泌)T",
    "(基础内分泌)AMH",
    "左窦卵泡数",
    "右窦卵泡数",
];

/// Keys of the core ordering.
pub fn core_feature_keys() -> impl Iterator<Item = &'static str> {
    CORE_FEATURES.iter().map(|f| f.key)
}

/// Keys of the full ordering (core followed by dynamic).
pub fn all_feature_keys() -> impl Iterator<Item = &'static str> {
    CORE_FEATURES
        .iter()
        .chain(DYNAMIC_FEATURES.iter())
        .map(|f| f.key)
}

/// Look up a feature definition by key.
#[must_use]
pub fn feature_spec(key: &str) -> Option<&'static FeatureSpec> {
    CORE_FEATURES
        .iter()
        .chain(DYNAMIC_FEATURES.iter())
        .find(|f| f.key == key)
}

/// User-supplied named values. Any subset may be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureInput {
    values: BTreeMap<String, f64>,
}

impl FeatureInput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    /// Builder-style `set`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.set(key, value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Keys that are not part of either model ordering.
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.values
            .keys()
            .map(String::as_str)
            .filter(|k| feature_spec(k).is_none())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for FeatureInput {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// The two positional vectors handed to the models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVectors {
    /// `CORE_FEATURES` order, length 10
    pub core: Vec<f64>,
    /// `CORE_FEATURES ++ DYNAMIC_FEATURES` order, length 28
    pub all: Vec<f64>,
}

impl FeatureVectors {
    /// Select the fixed orderings out of `input`.
    ///
    /// Absent and NaN entries are imputed as 0.0. Values are otherwise passed
    /// through unchanged, including negative or implausible ones.
    #[must_use]
    pub fn assemble(input: &FeatureInput) -> Self {
        let pick = |key: &str| match input.get(key) {
            Some(v) if !v.is_nan() => v,
            _ => 0.0,
        };

        let core: Vec<f64> = core_feature_keys().map(pick).collect();
        let all: Vec<f64> = all_feature_keys().map(pick).collect();

        Self { core, all }
    }

    /// Value of a named column after imputation.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<f64> {
        all_feature_keys()
            .position(|k| k == key)
            .and_then(|i| self.all.get(i).copied())
    }
}
