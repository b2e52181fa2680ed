//! Immutable set of loaded models and reference data.
//!
//! Built once at start-up and shared read-only (behind `Arc`) by every request.

use std::sync::Arc;

use crate::domain::{LabelEncoder, ReferenceTable, TriggerDayTable};
use crate::ports::{Classifier, Regressor};

/// Everything the prediction pipeline needs besides the request itself.
#[derive(Clone)]
pub struct ModelContext {
    /// Starting dose, core features
    pub dose: Arc<dyn Regressor>,
    /// Total dose, core features
    pub total_dose: Arc<dyn Regressor>,
    /// Total days, all features
    pub total_days: Arc<dyn Regressor>,
    /// Drug type code, core features
    pub drug: Arc<dyn Classifier>,
    /// Protocol code, core features
    pub protocol: Arc<dyn Classifier>,
    /// Trigger-day class, all features
    pub trigger: Arc<dyn Classifier>,
    pub drug_encoder: LabelEncoder,
    pub protocol_encoder: LabelEncoder,
    pub trigger_days: TriggerDayTable,
    pub references: ReferenceTable,
}

impl std::fmt::Debug for ModelContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelContext")
            .field("drug_classes", &self.drug_encoder.len())
            .field("protocol_classes", &self.protocol_encoder.len())
            .field("trigger_days", &self.trigger_days.len())
            .field("references", &self.references.len())
            .finish_non_exhaustive()
    }
}
