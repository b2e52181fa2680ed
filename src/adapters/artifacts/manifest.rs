//! Signed artifact manifest.
//!
//! `manifest.json` binds the SHA-256 of every artifact file; `artifacts.sig` is
//! an Ed25519 signature over the exact manifest bytes. Verification checks the
//! signature first, then that every required file is bound and unchanged.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{ArtifactError, ARTIFACT_FILES};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "artifacts.sig";

const MANIFEST_VERSION: u32 = 1;

/// Allowed clock skew for `created_at` (seconds).
const MAX_FUTURE_SKEW_SECS: i64 = 300;

/// Contents of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: u32,
    /// Unix timestamp (seconds) when the manifest was signed.
    pub created_at: i64,
    /// File name → lowercase hex SHA-256.
    pub files: BTreeMap<String, String>,
}

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Decode a base64 Ed25519 verifying key (surrounding whitespace ignored).
///
/// # Errors
/// Returns `ArtifactError::PublicKey` if the text is not a valid key.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ArtifactError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ArtifactError::PublicKey("invalid base64".into()))?;
    let pubkey: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        ArtifactError::PublicKey(format!("expected 32 bytes, got {}", bytes.len()))
    })?;
    VerifyingKey::from_bytes(&pubkey)
        .map_err(|_| ArtifactError::PublicKey("not a valid Ed25519 point".into()))
}

/// Verify the manifest signature and that it binds `files` byte for byte.
///
/// # Errors
/// Returns `ArtifactError::Signature` for a bad or missing signature or an
/// unacceptable manifest, `ArtifactError::HashMismatch` if a file changed.
pub fn verify(
    dir: &Path,
    key: &VerifyingKey,
    files: &BTreeMap<&'static str, Vec<u8>>,
) -> Result<ArtifactManifest, ArtifactError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let sig_path = dir.join(SIGNATURE_FILE);

    let manifest_bytes = fs::read(&manifest_path).map_err(|source| ArtifactError::Io {
        path: manifest_path.clone(),
        source,
    })?;
    let sig_bytes = fs::read(&sig_path).map_err(|source| ArtifactError::Io {
        path: sig_path.clone(),
        source,
    })?;

    let sig: [u8; 64] = sig_bytes.as_slice().try_into().map_err(|_| {
        ArtifactError::Signature(format!(
            "invalid signature length {} (expected 64 bytes)",
            sig_bytes.len()
        ))
    })?;
    key.verify(&manifest_bytes, &Signature::from_bytes(&sig))
        .map_err(|_| ArtifactError::Signature("signature does not match manifest".into()))?;

    let manifest: ArtifactManifest =
        serde_json::from_slice(&manifest_bytes).map_err(|source| ArtifactError::Parse {
            file: MANIFEST_FILE.to_string(),
            source,
        })?;

    if manifest.version != MANIFEST_VERSION {
        return Err(ArtifactError::Signature(format!(
            "unsupported manifest version {}",
            manifest.version
        )));
    }
    if manifest.created_at > chrono::Utc::now().timestamp() + MAX_FUTURE_SKEW_SECS {
        return Err(ArtifactError::Signature(
            "manifest created_at is in the future".into(),
        ));
    }

    for (name, bytes) in files {
        let expected = manifest
            .files
            .get(*name)
            .ok_or_else(|| ArtifactError::Signature(format!("manifest does not bind {name}")))?;
        if !constant_time_eq_str(&sha256_hex(bytes), expected) {
            return Err(ArtifactError::HashMismatch((*name).to_string()));
        }
    }

    tracing::info!(
        "Artifact manifest verified ({} files, created_at={})",
        manifest.files.len(),
        manifest.created_at
    );
    Ok(manifest)
}

/// Hash every artifact in `dir`, then write `manifest.json` and `artifacts.sig`.
///
/// # Errors
/// Returns error if an artifact is missing or a file cannot be written.
pub fn sign_directory(dir: &Path, key: &SigningKey) -> Result<ArtifactManifest, ArtifactError> {
    let mut files = BTreeMap::new();
    for name in ARTIFACT_FILES {
        let path = dir.join(name);
        let bytes = fs::read(&path).map_err(|source| ArtifactError::Io { path, source })?;
        files.insert(name.to_string(), sha256_hex(&bytes));
    }

    let manifest = ArtifactManifest {
        version: MANIFEST_VERSION,
        created_at: chrono::Utc::now().timestamp(),
        files,
    };
    let manifest_bytes =
        serde_json::to_vec_pretty(&manifest).map_err(|source| ArtifactError::Parse {
            file: MANIFEST_FILE.to_string(),
            source,
        })?;

    let manifest_path = dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, &manifest_bytes).map_err(|source| ArtifactError::Io {
        path: manifest_path,
        source,
    })?;

    let sig: Signature = key.sign(&manifest_bytes);
    let sig_path = dir.join(SIGNATURE_FILE);
    fs::write(&sig_path, sig.to_bytes()).map_err(|source| ArtifactError::Io {
        path: sig_path,
        source,
    })?;

    Ok(manifest)
}
