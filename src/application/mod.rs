//! Application layer: Use cases and services.
//!
//! Services share one immutable `ModelContext` and run synchronously.

mod assessment;
mod context;
mod percentile;
pub(crate) mod prediction;

pub use assessment::AssessmentService;
pub use context::ModelContext;
pub use percentile::{PercentileService, BASELINE_REFERENCE_KEY};
pub use prediction::PredictionService;
