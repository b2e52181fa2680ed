//! Small but complete artifact directory for tests.
//!
//! - dose: `100 + 2 * age`
//! - total dose: constant 2250
//! - total days: 9 when round-1 E2 <= 1000, else 11
//! - drug: binary linear, `HMG` when `0.1 * age - 1 > 0`
//! - protocol: single-leaf forest, always `Antagonist`
//! - trigger: multiclass linear, always class 1 (day 11); class 2 is unmapped

use std::fs;
use std::path::Path;

use base64::Engine;
use ed25519_dalek::SigningKey;
use serde_json::{json, Value};

use crate::domain::features::{all_feature_keys, core_feature_keys};

use super::*;

pub(crate) fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[7u8; 32])
}

pub(crate) fn public_key_b64(key: &SigningKey) -> String {
    base64::engine::general_purpose::STANDARD.encode(key.verifying_key().as_bytes())
}

pub(crate) fn write_json(dir: &Path, name: &str, value: &Value) {
    let bytes = serde_json::to_vec_pretty(value).expect("serialize fixture");
    fs::write(dir.join(name), bytes).expect("write fixture");
}

fn core_names() -> Vec<String> {
    core_feature_keys().map(String::from).collect()
}

fn all_names() -> Vec<String> {
    all_feature_keys().map(String::from).collect()
}

/// Linear regressor weighting only the first column.
pub(crate) fn linear_regressor(names: Vec<String>, first_weight: f64, intercept: f64) -> Value {
    let mut coefficients = vec![0.0; names.len()];
    if let Some(w) = coefficients.first_mut() {
        *w = first_weight;
    }
    json!({
        "kind": "linear_regressor",
        "feature_names": names,
        "coefficients": coefficients,
        "intercept": intercept,
    })
}

/// Write every artifact file, without a manifest.
pub(crate) fn write_artifacts(dir: &Path) {
    write_json(dir, DOSE_MODEL, &linear_regressor(core_names(), 2.0, 100.0));
    write_json(dir, TOTAL_DOSE_MODEL, &linear_regressor(core_names(), 0.0, 2250.0));

    // Split on 血E2_1 (position 10 of the full ordering).
    write_json(dir, TOTAL_DAYS_MODEL, &json!({
        "kind": "tree_ensemble_regressor",
        "feature_names": all_names(),
        "trees": [{
            "children_left": [1, -1, -1],
            "children_right": [2, -1, -1],
            "feature": [10, -2, -2],
            "threshold": [1000.0, -2.0, -2.0],
            "value": [[10.0], [9.0], [11.0]],
        }],
    }));

    let mut drug_row = vec![0.0; 10];
    drug_row[0] = 0.1;
    write_json(dir, DRUG_MODEL, &json!({
        "kind": "linear_classifier",
        "feature_names": core_names(),
        "classes": [0, 1],
        "coefficients": [drug_row],
        "intercepts": [-1.0],
    }));

    write_json(dir, PROTOCOL_MODEL, &json!({
        "kind": "tree_ensemble_classifier",
        "feature_names": core_names(),
        "classes": [0, 1, 2],
        "trees": [{
            "children_left": [-1],
            "children_right": [-1],
            "feature": [-2],
            "threshold": [-2.0],
            "value": [[1.0, 8.0, 1.0]],
        }],
    }));

    write_json(dir, TRIGGER_MODEL, &json!({
        "kind": "linear_classifier",
        "feature_names": all_names(),
        "classes": [0, 1, 2],
        "coefficients": [vec![0.0; 28], vec![0.0; 28], vec![0.0; 28]],
        "intercepts": [0.0, 1.0, 0.5],
    }));

    write_json(dir, DRUG_ENCODER, &json!({ "classes": ["rFSH", "HMG"] }));
    write_json(dir, PROTOCOL_ENCODER, &json!({ "classes": ["Agonist", "Antagonist", "Long"] }));
    write_json(dir, TRIGGER_DAY_MAPPING, &json!({ "0": 10, "1": 11 }));

    write_json(dir, E2_PERCENTILES, &json!({
        "血E2_1": [null, 80.0, 120.0, 160.0, 200.0],
        "血E2_2": [150.0, 300.0, 450.0, 600.0],
        "血E2_3": { "p25": 400.0, "p50": 800.0, "p75": 1200.0 },
        "基础E2": [20.0, 30.0, 40.0, 50.0, 60.0],
    }));
}

/// Write every artifact and sign the directory with `signing_key()`.
pub(crate) fn write_signed(dir: &Path) -> SigningKey {
    write_artifacts(dir);
    let key = signing_key();
    sign_directory(dir, &key).expect("sign fixture");
    key
}
