//! Artifact signing utility.
//!
//! Hashes every model and reference file in an artifact directory, writes the
//! manifest (`manifest.json`) and its Ed25519 signature (`artifacts.sig`).
//!
//! # Usage
//!
//! ```bash
//! GNSTART_ARTIFACT_SIGNING_KEY_B64_FILE=keys/seed.b64 cargo run --bin sign_artifacts -- artifacts
//! ```
//!
//! The signing seed is read from, in order: a file descriptor
//! (`GNSTART_ARTIFACT_SIGNING_KEY_B64_FD`), a file
//! (`GNSTART_ARTIFACT_SIGNING_KEY_B64_FILE`), the Docker secret, or (debug
//! builds only) `GNSTART_ARTIFACT_SIGNING_KEY_B64`.

use std::env;
use std::fs;
#[cfg(unix)]
use std::os::unix::io::FromRawFd;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::SigningKey;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use gnstart::adapters::artifacts::{sign_directory, MANIFEST_FILE, SIGNATURE_FILE};

const KEY_FD_ENV: &str = "GNSTART_ARTIFACT_SIGNING_KEY_B64_FD";
const KEY_FILE_ENV: &str = "GNSTART_ARTIFACT_SIGNING_KEY_B64_FILE";
const KEY_ENV: &str = "GNSTART_ARTIFACT_SIGNING_KEY_B64";
const DOCKER_SECRET_PATH: &str = "/run/secrets/gnstart_artifact_signing_key_b64";

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn non_empty(secret: &str) -> Result<Zeroizing<String>> {
    let secret = secret.trim_end_matches(['\n', '\r']);
    if secret.is_empty() {
        bail!("Empty signing key");
    }
    Ok(Zeroizing::new(secret.to_string()))
}

fn read_signing_seed_b64() -> Result<Zeroizing<String>> {
    #[cfg(unix)]
    if let Ok(fd_str) = env::var(KEY_FD_ENV) {
        let fd: i32 = fd_str.trim().parse().context("Invalid key FD")?;
        if fd <= 2 {
            bail!("Refusing to read signing key from stdio FD");
        }
        // SAFETY: take ownership of FD for one-time secret read.
        let mut file = unsafe { std::fs::File::from_raw_fd(fd) };
        let mut buf = Zeroizing::new(String::new());
        use std::io::Read;
        file.read_to_string(&mut buf)
            .context("Failed reading signing key from FD")?;
        return non_empty(&buf);
    }

    if let Ok(path) = env::var(KEY_FILE_ENV) {
        let content = Zeroizing::new(
            fs::read_to_string(path.trim()).context("Failed reading signing key file")?,
        );
        return non_empty(&content);
    }

    if Path::new(DOCKER_SECRET_PATH).exists() {
        let content = Zeroizing::new(
            fs::read_to_string(DOCKER_SECRET_PATH).context("Failed reading docker secret")?,
        );
        return non_empty(&content);
    }

    // Dev-only fallback for convenience.
    if cfg!(debug_assertions) {
        if let Ok(v) = env::var(KEY_ENV) {
            return non_empty(&Zeroizing::new(v));
        }
    }

    Err(anyhow!(
        "Missing signing key. Provide one of: {KEY_FD_ENV}, {KEY_FILE_ENV}, or {DOCKER_SECRET_PATH} ({KEY_ENV} only in debug builds)."
    ))
}

fn read_signing_seed() -> Result<Seed> {
    let v = read_signing_seed_b64()?;

    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(v.trim())
            .context("Invalid base64 in signing key")?,
    );

    if raw.len() != 32 {
        bail!(
            "Signing key seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        );
    }

    let mut seed = Seed([0u8; 32]);
    seed.0.copy_from_slice(&raw);
    Ok(seed)
}

fn parse_args() -> Result<PathBuf> {
    const USAGE: &str = "Usage: sign_artifacts <artifact_dir>";

    let mut args = env::args().skip(1);
    let dir = match (args.next(), args.next()) {
        (Some(a), None) if a != "-h" && a != "--help" => PathBuf::from(a),
        _ => bail!(USAGE),
    };

    if !dir.is_dir() {
        bail!("{dir:?} is not a directory\n{USAGE}");
    }
    Ok(dir)
}

fn main() -> Result<()> {
    let dir = parse_args()?;

    let seed = read_signing_seed()?;
    let signing_key = SigningKey::from_bytes(&seed.0);
    drop(seed);

    let manifest = sign_directory(&dir, &signing_key)
        .with_context(|| format!("Failed to sign {dir:?}"))?;

    println!(
        "Signed {} files: {:?}",
        manifest.files.len(),
        dir.join(MANIFEST_FILE)
    );
    println!("Wrote signature: {:?}", dir.join(SIGNATURE_FILE));
    println!(
        "PUBKEY (base64)={}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes())
    );

    Ok(())
}
