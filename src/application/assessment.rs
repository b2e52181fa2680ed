//! Assessment service: one form submission end to end.
//!
//! Assembly, prediction and percentile annotation. Every submission recomputes
//! the whole pipeline; nothing is cached between requests.

use std::io::{Read, Write};
use std::sync::Arc;

use crate::domain::{Assessment, FeatureInput, FeatureVectors};
use crate::GnStartError;

use super::{ModelContext, PercentileService, PredictionService};

/// Service for producing a full `Assessment` from raw input.
pub struct AssessmentService {
    prediction: PredictionService,
    percentile: PercentileService,
}

impl AssessmentService {
    /// Create a new assessment service over a loaded context.
    pub fn new(context: Arc<ModelContext>) -> Self {
        Self {
            prediction: PredictionService::new(Arc::clone(&context)),
            percentile: PercentileService::new(context),
        }
    }

    /// Assess one patient.
    ///
    /// # Errors
    /// Returns error if any model fails or a label cannot be decoded.
    pub fn assess(&self, input: &FeatureInput) -> Result<Assessment, GnStartError> {
        let unknown: Vec<&str> = input.unknown_keys().collect();
        if !unknown.is_empty() {
            tracing::warn!("Ignoring {} unknown input field(s): {:?}", unknown.len(), unknown);
        }

        let features = FeatureVectors::assemble(input);
        let prediction = self.prediction.predict(&features)?;
        let e2_trend = self.percentile.e2_trend(&features);
        let baseline = self.percentile.baseline(&features);

        let assessment = Assessment::new(features, prediction, e2_trend, baseline);
        tracing::info!(
            "Assessment complete ({} trend markers, baseline chart: {})",
            assessment.e2_trend.markers.len(),
            assessment.baseline.is_some()
        );

        Ok(assessment)
    }

    /// Batch mode: one JSON object of named values in, the assessment as
    /// pretty JSON out.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the input is not an object of numbers (a
    /// `null` value included), an assessment error, or the write error.
    pub fn assess_json<R: Read, W: Write>(
        &self,
        input: R,
        mut output: W,
    ) -> Result<Assessment, GnStartError> {
        let input: FeatureInput = serde_json::from_reader(input).map_err(|e| {
            GnStartError::InvalidInput(format!("expected a JSON object of numeric fields: {e}"))
        })?;

        let assessment = self.assess(&input)?;
        serde_json::to_writer_pretty(&mut output, &assessment)?;
        writeln!(output)?;
        output.flush()?;
        Ok(assessment)
    }
}
