//! Ports layer: Trait definitions for external collaborators.
//!
//! The trained models are opaque to the application; these traits are the
//! boundary the artifact adapters implement.

mod model;

pub use model::{check_width, Classifier, Regressor};
