//! Artifact store: loads the exported models and reference data once.
//!
//! Every artifact is read into memory a single time; the same bytes are hashed
//! against the signed manifest and then parsed. Any failure is fatal.

mod manifest;

#[cfg(test)]
pub(crate) mod fixtures;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ed25519_dalek::VerifyingKey;
use serde::de::DeserializeOwned;

use crate::application::ModelContext;
use crate::config::AppConfig;
use crate::domain::features::{all_feature_keys, core_feature_keys};
use crate::domain::{
    LabelEncoder, ModelError, QuantileMethod, ReferenceDistribution, ReferenceTable, TriggerDay,
    TriggerDayTable,
};
use crate::ports::{Classifier, Regressor};

use super::estimators::ExportedEstimator;

pub use manifest::{
    sha256_hex, sign_directory, verify, verifying_key_from_b64, ArtifactManifest, MANIFEST_FILE,
    SIGNATURE_FILE,
};

pub const DOSE_MODEL: &str = "reg_dose_model.json";
pub const TOTAL_DOSE_MODEL: &str = "reg_totaldose_model.json";
pub const TOTAL_DAYS_MODEL: &str = "reg_totaldays_model.json";
pub const DRUG_MODEL: &str = "clf_drug_model.json";
pub const PROTOCOL_MODEL: &str = "clf_protocol_model.json";
pub const TRIGGER_MODEL: &str = "clf_triggerday_model.json";
pub const DRUG_ENCODER: &str = "drug_encoder.json";
pub const PROTOCOL_ENCODER: &str = "protocol_encoder.json";
pub const TRIGGER_DAY_MAPPING: &str = "trigger_label_day_mapping.json";
pub const E2_PERCENTILES: &str = "e2_percentiles.json";

/// Every file the manifest must bind.
pub const ARTIFACT_FILES: [&str; 10] = [
    DOSE_MODEL,
    TOTAL_DOSE_MODEL,
    TOTAL_DAYS_MODEL,
    DRUG_MODEL,
    PROTOCOL_MODEL,
    TRIGGER_MODEL,
    DRUG_ENCODER,
    PROTOCOL_ENCODER,
    TRIGGER_DAY_MAPPING,
    E2_PERCENTILES,
];

/// Public key secret mounted by container deployments.
const DOCKER_SECRET_PUBKEY: &str = "/run/secrets/gnstart_artifact_pubkey_b64";

/// Artifact loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Artifact signature verification failed: {0}")]
    Signature(String),

    #[error("File hash mismatch for {0}")]
    HashMismatch(String),

    #[error("{file}: feature order does not match the {expected} feature set ({detail})")]
    FeatureOrder {
        file: String,
        expected: &'static str,
        detail: String,
    },

    #[error("{file}: classes not decodable by {encoder}: {detail}")]
    EncoderMismatch {
        file: String,
        encoder: String,
        detail: String,
    },

    #[error("{file}: {source}")]
    Model {
        file: String,
        #[source]
        source: ModelError,
    },

    #[error("No artifact verifying key configured (set GNSTART_ARTIFACT_PUBKEY_B64_FILE)")]
    MissingPublicKey,

    #[error("Invalid artifact verifying key: {0}")]
    PublicKey(String),
}

/// How the artifact directory is authenticated.
#[derive(Debug, Clone)]
pub enum VerifyPolicy {
    /// Require a valid manifest signed by this key.
    Verify(VerifyingKey),
    /// Skip verification. Refused by release builds.
    AllowUnsigned,
}

impl VerifyPolicy {
    /// Resolve the policy from configuration.
    ///
    /// The key file named by the configuration wins, then the container
    /// secret. Without either, unsigned loading is only possible when the
    /// configuration allows it.
    ///
    /// # Errors
    /// Returns error if the key cannot be read or decoded, or if no key is
    /// available and unsigned artifacts are not allowed.
    pub fn from_config(config: &AppConfig) -> Result<Self, ArtifactError> {
        let key_path = config
            .artifact_pubkey_file
            .clone()
            .or_else(|| Some(PathBuf::from(DOCKER_SECRET_PUBKEY)).filter(|p| p.exists()));

        match key_path {
            Some(path) => {
                let b64 = fs::read_to_string(&path)
                    .map_err(|source| ArtifactError::Io { path, source })?;
                Ok(Self::Verify(verifying_key_from_b64(&b64)?))
            }
            None if config.allow_unsigned_artifacts => Ok(Self::AllowUnsigned),
            None => Err(ArtifactError::MissingPublicKey),
        }
    }
}

/// Which fixed ordering a model must have been fitted on.
#[derive(Debug, Clone, Copy)]
enum FeatureSet {
    Core,
    All,
}

impl FeatureSet {
    fn name(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::All => "all",
        }
    }

    fn keys(self) -> Vec<&'static str> {
        match self {
            Self::Core => core_feature_keys().collect(),
            Self::All => all_feature_keys().collect(),
        }
    }
}

/// Load and verify the artifact directory named by the configuration.
///
/// # Errors
/// Returns the first artifact error encountered.
pub fn load_from_config(config: &AppConfig) -> Result<ModelContext, ArtifactError> {
    let policy = VerifyPolicy::from_config(config)?;
    load_context(&config.artifact_dir, &policy, config.quantile_method)
}

/// Load every artifact from `dir` and build the immutable model context.
///
/// # Errors
/// Returns error if a file is missing or unreadable, verification fails, a
/// model was fitted on the wrong feature order, or a classifier emits codes
/// its encoder cannot decode.
pub fn load_context(
    dir: &Path,
    policy: &VerifyPolicy,
    method: QuantileMethod,
) -> Result<ModelContext, ArtifactError> {
    tracing::info!("Loading artifacts from {:?}", dir);

    let files = read_all(dir)?;

    match policy {
        VerifyPolicy::Verify(key) => {
            verify(dir, key, &files)?;
        }
        VerifyPolicy::AllowUnsigned => {
            if cfg!(debug_assertions) {
                tracing::warn!(
                    "Loading UNSIGNED artifacts (GNSTART_ALLOW_UNSIGNED_ARTIFACTS=true). \
                     This is only allowed in debug builds."
                );
            } else {
                return Err(ArtifactError::Signature(
                    "unsigned artifacts are refused in release builds".into(),
                ));
            }
        }
    }

    let dose = load_regressor(&files, DOSE_MODEL, FeatureSet::Core)?;
    let total_dose = load_regressor(&files, TOTAL_DOSE_MODEL, FeatureSet::Core)?;
    let total_days = load_regressor(&files, TOTAL_DAYS_MODEL, FeatureSet::All)?;
    let drug = load_classifier(&files, DRUG_MODEL, FeatureSet::Core)?;
    let protocol = load_classifier(&files, PROTOCOL_MODEL, FeatureSet::Core)?;
    let trigger = load_classifier(&files, TRIGGER_MODEL, FeatureSet::All)?;

    let drug_encoder: LabelEncoder = parse(&files, DRUG_ENCODER)?;
    let protocol_encoder: LabelEncoder = parse(&files, PROTOCOL_ENCODER)?;
    check_decodable(DRUG_MODEL, drug.as_ref(), DRUG_ENCODER, &drug_encoder)?;
    check_decodable(PROTOCOL_MODEL, protocol.as_ref(), PROTOCOL_ENCODER, &protocol_encoder)?;

    let trigger_days: TriggerDayTable = parse(&files, TRIGGER_DAY_MAPPING)?;
    let unmapped: Vec<i64> = trigger
        .classes()
        .iter()
        .copied()
        .filter(|&c| trigger_days.resolve(c) == TriggerDay::NotAvailable)
        .collect();
    if !unmapped.is_empty() {
        tracing::warn!("Trigger classes without a day mapping (shown as N/A): {unmapped:?}");
    }

    let entries: BTreeMap<String, ReferenceDistribution> = parse(&files, E2_PERCENTILES)?;
    let references = ReferenceTable::new(entries, method);

    tracing::info!(
        "Artifacts loaded: {} reference distributions, quantile method {:?}",
        references.len(),
        method
    );

    Ok(ModelContext {
        dose,
        total_dose,
        total_days,
        drug,
        protocol,
        trigger,
        drug_encoder,
        protocol_encoder,
        trigger_days,
        references,
    })
}

fn read_all(dir: &Path) -> Result<BTreeMap<&'static str, Vec<u8>>, ArtifactError> {
    ARTIFACT_FILES
        .iter()
        .map(|&name| {
            let path = dir.join(name);
            let bytes = fs::read(&path).map_err(|source| ArtifactError::Io { path, source })?;
            Ok((name, bytes))
        })
        .collect()
}

fn parse<T: DeserializeOwned>(
    files: &BTreeMap<&'static str, Vec<u8>>,
    name: &'static str,
) -> Result<T, ArtifactError> {
    let bytes = files.get(name).map(Vec::as_slice).unwrap_or_default();
    serde_json::from_slice(bytes).map_err(|source| ArtifactError::Parse {
        file: name.to_string(),
        source,
    })
}

fn check_feature_order(
    file: &str,
    names: &[String],
    set: FeatureSet,
) -> Result<(), ArtifactError> {
    let expected = set.keys();
    let mismatch = |detail: String| ArtifactError::FeatureOrder {
        file: file.to_string(),
        expected: set.name(),
        detail,
    };

    if names.len() != expected.len() {
        return Err(mismatch(format!(
            "{} features, expected {}",
            names.len(),
            expected.len()
        )));
    }
    if let Some((i, (got, want))) = names
        .iter()
        .zip(&expected)
        .enumerate()
        .find(|(_, (got, want))| got.as_str() != **want)
    {
        return Err(mismatch(format!("position {i} is {got}, expected {want}")));
    }
    Ok(())
}

fn load_estimator(
    files: &BTreeMap<&'static str, Vec<u8>>,
    name: &'static str,
    set: FeatureSet,
) -> Result<ExportedEstimator, ArtifactError> {
    let estimator: ExportedEstimator = parse(files, name)?;
    check_feature_order(name, estimator.feature_names(), set)?;
    tracing::debug!("Loaded {} ({})", name, estimator.kind());
    Ok(estimator)
}

fn load_regressor(
    files: &BTreeMap<&'static str, Vec<u8>>,
    name: &'static str,
    set: FeatureSet,
) -> Result<Arc<dyn Regressor>, ArtifactError> {
    load_estimator(files, name, set)?
        .into_regressor()
        .map_err(|source| ArtifactError::Model {
            file: name.to_string(),
            source,
        })
}

fn load_classifier(
    files: &BTreeMap<&'static str, Vec<u8>>,
    name: &'static str,
    set: FeatureSet,
) -> Result<Arc<dyn Classifier>, ArtifactError> {
    load_estimator(files, name, set)?
        .into_classifier()
        .map_err(|source| ArtifactError::Model {
            file: name.to_string(),
            source,
        })
}

/// Every class a classifier can emit must decode through its encoder.
fn check_decodable(
    file: &str,
    model: &dyn Classifier,
    encoder_file: &str,
    encoder: &LabelEncoder,
) -> Result<(), ArtifactError> {
    let undecodable: Vec<i64> = model
        .classes()
        .iter()
        .copied()
        .filter(|&c| encoder.inverse_transform(c).is_err())
        .collect();
    if undecodable.is_empty() {
        Ok(())
    } else {
        Err(ArtifactError::EncoderMismatch {
            file: file.to_string(),
            encoder: encoder_file.to_string(),
            detail: format!("codes {undecodable:?} with {} labels", encoder.len()),
        })
    }
}
