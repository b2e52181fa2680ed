//! Prediction service: runs every model against the assembled features.
//!
//! Each model is independent. Any model or decoder failure aborts the whole
//! prediction; only an unknown trigger class degrades (to `N/A`).

use std::sync::Arc;

use crate::domain::{FeatureVectors, PredictionResult};
use crate::GnStartError;

use super::ModelContext;

/// Service for running the six predictions of one request.
pub struct PredictionService {
    context: Arc<ModelContext>,
}

impl PredictionService {
    /// Create a new prediction service.
    pub fn new(context: Arc<ModelContext>) -> Self {
        Self { context }
    }

    /// Predict all outputs for one patient.
    ///
    /// Dose, total dose, drug and protocol use the core vector; total days and
    /// trigger day use the full vector.
    ///
    /// # Errors
    /// Returns `GnStartError::Model` if any model fails or a drug/protocol code
    /// cannot be decoded.
    pub fn predict(&self, features: &FeatureVectors) -> Result<PredictionResult, GnStartError> {
        let ctx = &self.context;

        tracing::debug!("Predicting starting dose...");
        let starting_dose = ctx.dose.predict(&features.core)?;

        tracing::debug!("Predicting total dose...");
        let total_dose = ctx.total_dose.predict(&features.core)?;

        tracing::debug!("Predicting total days...");
        let total_days = ctx.total_days.predict(&features.all)?;

        tracing::debug!("Predicting drug type...");
        let drug_code = ctx.drug.predict(&features.core)?;
        let drug_type = ctx.drug_encoder.inverse_transform(drug_code)?.to_string();

        tracing::debug!("Predicting protocol...");
        let protocol_code = ctx.protocol.predict(&features.core)?;
        let protocol = ctx.protocol_encoder.inverse_transform(protocol_code)?.to_string();

        tracing::debug!("Predicting trigger day...");
        let trigger_class = ctx.trigger.predict(&features.all)?;
        let trigger_day = ctx.trigger_days.resolve(trigger_class);

        let result = PredictionResult {
            starting_dose,
            drug_type,
            protocol,
            total_dose,
            total_days,
            trigger_class,
            trigger_day,
        };

        tracing::info!(
            "Prediction complete: dose={:.0} IU, drug={}, protocol={}, total_dose={:.0} IU, total_days={:.1}, trigger=day {} (class {})",
            result.starting_dose,
            result.drug_type,
            result.protocol,
            result.total_dose,
            result.total_days,
            result.trigger_day,
            result.trigger_class
        );

        Ok(result)
    }
}
