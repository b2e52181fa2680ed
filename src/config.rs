//! Runtime configuration from `GNSTART_*` environment variables.

use std::path::PathBuf;

use crate::domain::QuantileMethod;

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogMode {
    /// File when stdout is an interactive terminal, stderr otherwise.
    #[default]
    Auto,
    File,
    Stderr,
}

impl std::str::FromStr for LogMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "file" => Ok(Self::File),
            "stderr" => Ok(Self::Stderr),
            other => Err(format!("Unknown log mode: {other}")),
        }
    }
}

impl LogMode {
    /// Whether to log to a file, given whether stdout is a terminal.
    #[must_use]
    pub fn use_file(self, interactive: bool) -> bool {
        match self {
            Self::Auto => interactive,
            Self::File => true,
            Self::Stderr => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub artifact_dir: PathBuf,
    pub log_mode: LogMode,
    pub log_file: PathBuf,
    /// File holding the base64 Ed25519 artifact verifying key.
    pub artifact_pubkey_file: Option<PathBuf>,
    /// Always false in release builds.
    pub allow_unsigned_artifacts: bool,
    pub quantile_method: QuantileMethod,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("artifacts"),
            log_mode: LogMode::Auto,
            log_file: PathBuf::from("gnstart.log"),
            artifact_pubkey_file: None,
            allow_unsigned_artifacts: false,
            quantile_method: QuantileMethod::Midpoint,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// Returns a message naming the variable if a value cannot be parsed.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let defaults = Self::default();
        let non_empty = |name: &str| get(name).filter(|v| !v.trim().is_empty());

        let log_mode = match non_empty("GNSTART_LOG_MODE") {
            Some(v) => v.parse().map_err(|e| format!("GNSTART_LOG_MODE: {e}"))?,
            None => defaults.log_mode,
        };
        let quantile_method = match non_empty("GNSTART_QUANTILE_METHOD") {
            Some(v) => v.parse().map_err(|e| format!("GNSTART_QUANTILE_METHOD: {e}"))?,
            None => defaults.quantile_method,
        };

        Ok(Self {
            artifact_dir: non_empty("GNSTART_ARTIFACT_DIR")
                .map_or(defaults.artifact_dir, PathBuf::from),
            log_mode,
            log_file: non_empty("GNSTART_LOG_FILE").map_or(defaults.log_file, PathBuf::from),
            artifact_pubkey_file: non_empty("GNSTART_ARTIFACT_PUBKEY_B64_FILE")
                .map(|v| PathBuf::from(v.trim())),
            allow_unsigned_artifacts: cfg!(debug_assertions)
                && get("GNSTART_ALLOW_UNSIGNED_ARTIFACTS").is_some_and(|v| parse_bool(&v)),
            quantile_method,
        })
    }
}

/// `1/true/TRUE/yes/YES` are true; anything else is false.
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES")
}
