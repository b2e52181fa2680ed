//! Domain layer: clinical features, reference statistics and result types.
//!
//! Pure types and functions; no I/O.

pub mod distribution;
pub mod features;
mod prediction;
mod report;

pub use distribution::{
    dist_stats, percentile_rank, DistStats, QuantileMethod, ReferenceDistribution, ReferenceTable,
};
pub use features::{FeatureInput, FeatureSpec, FeatureVectors};
pub use prediction::{LabelEncoder, ModelError, PredictionResult, TriggerDay, TriggerDayTable};
pub use report::{
    Assessment, Band, BaselineChart, E2TrendChart, RoundMarker, BASELINE_UNAVAILABLE,
};
