//! Adapters layer: Concrete implementations of ports.
//!
//! - `estimators`: in-process inference for exported linear and tree models
//! - `artifacts`: signed artifact directory loading
//! - `sanitize`: PII filtering for logs

pub mod artifacts;
pub mod estimators;
pub mod sanitize;

pub use artifacts::ArtifactError;
