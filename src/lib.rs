//! # gnstart
//!
//! Decision support for choosing a gonadotropin (Gn) starting protocol.
//!
//! Baseline endocrine values and up to three hormone-monitoring rounds go in.
//! Six treatment predictions (starting dose, drug, protocol, total dose, total
//! days, trigger day) come out, together with where the patient's E2 values
//! sit in a reference population.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: feature ordering, reference statistics, result types
//! - `ports`: model traits (`Regressor`, `Classifier`)
//! - `adapters`: exported-estimator inference, signed artifact loading, log sanitization
//! - `application`: prediction, percentile and assessment services
//! - `tui`: terminal user interface

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod tui;

pub use domain::{Assessment, FeatureInput, PredictionResult};

/// Result type for gnstart operations
pub type Result<T> = std::result::Result<T, GnStartError>;

/// Main error type for gnstart
#[derive(Debug, thiserror::Error)]
pub enum GnStartError {
    #[error("Artifact loading failed: {0}")]
    Artifact(#[from] adapters::artifacts::ArtifactError),

    #[error("Model evaluation failed: {0}")]
    Model(#[from] domain::ModelError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
