//! Percentile annotation of observed E2 values.

use std::sync::Arc;

use crate::domain::features::{BASELINE_E2_KEY, ROUND_E2_KEYS};
use crate::domain::{BaselineChart, E2TrendChart, FeatureVectors, RoundMarker};

use super::ModelContext;

/// Reference-table key for baseline E2 (differs from the input column name).
pub const BASELINE_REFERENCE_KEY: &str = "基础E2";

/// Service for placing E2 values inside the reference population.
pub struct PercentileService {
    context: Arc<ModelContext>,
}

impl PercentileService {
    /// Create a new percentile service.
    pub fn new(context: Arc<ModelContext>) -> Self {
        Self { context }
    }

    /// One marker per monitoring round that has reference data.
    #[must_use]
    pub fn e2_trend(&self, features: &FeatureVectors) -> E2TrendChart {
        let references = &self.context.references;

        let markers = ROUND_E2_KEYS
            .iter()
            .enumerate()
            .filter_map(|(i, key)| {
                let Some(stats) = references.stats(key) else {
                    tracing::debug!("No reference data for {key}, skipping round");
                    return None;
                };
                let value = features.value(key).unwrap_or(0.0);
                Some(RoundMarker {
                    round: i + 1,
                    key: (*key).to_string(),
                    label: format!("E2_{}", i + 1),
                    value,
                    band: stats.band().map(Into::into),
                    median: stats.p50,
                    percentile_rank: stats.rank(value),
                })
            })
            .collect();

        E2TrendChart { markers }
    }

    /// Baseline E2 chart, or `None` when it cannot be drawn.
    #[must_use]
    pub fn baseline(&self, features: &FeatureVectors) -> Option<BaselineChart> {
        let stats = self.context.references.stats(BASELINE_REFERENCE_KEY)?;
        let value = features.value(BASELINE_E2_KEY)?;
        if value.is_nan() {
            return None;
        }

        Some(BaselineChart {
            value,
            band: stats.band().map(Into::into),
            median: stats.p50,
            percentile_rank: stats.rank(value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::prediction::tests::stub_context;
    use crate::domain::{Band, FeatureInput, QuantileMethod, ReferenceDistribution, ReferenceTable};
    use std::collections::BTreeMap;

    fn service_with(entries: BTreeMap<String, ReferenceDistribution>) -> PercentileService {
        let mut ctx = stub_context(0, 0);
        ctx.references = ReferenceTable::new(entries, QuantileMethod::Midpoint);
        PercentileService::new(Arc::new(ctx))
    }

    #[test]
    fn test_trend_skips_rounds_without_reference() {
        let service = service_with(BTreeMap::from([
            ("血E2_1".to_string(), ReferenceDistribution::raw([10.0, 20.0, 30.0, 40.0])),
            (
                "血E2_3".to_string(),
                ReferenceDistribution::Summary {
                    p25: Some(500.0),
                    p50: Some(900.0),
                    p75: None,
                },
            ),
        ]));
        let input = FeatureInput::new().with("血E2_1", 25.0).with("血E2_3", 1200.0);
        let chart = service.e2_trend(&FeatureVectors::assemble(&input));

        assert_eq!(chart.markers.len(), 2);

        let first = &chart.markers[0];
        assert_eq!(first.round, 1);
        assert_eq!(first.label, "E2_1");
        assert_eq!(first.percentile_rank, Some(50));
        assert_eq!(first.band, Some(Band { p25: 15.0, p75: 35.0 }));
        assert_eq!(first.explanation(), "血E2_1: 25 pg/mL, at P50");

        let third = &chart.markers[1];
        assert_eq!(third.round, 3);
        assert_eq!(third.band, None);
        assert_eq!(third.median, Some(900.0));
        assert_eq!(third.percentile_rank, None);
        assert_eq!(third.explanation(), "血E2_3: 1200 pg/mL (reference P25–P75)");
    }

    #[test]
    fn test_missing_round_value_is_plotted_as_zero() {
        let service = service_with(BTreeMap::from([(
            "血E2_2".to_string(),
            ReferenceDistribution::raw([100.0, 200.0]),
        )]));
        let chart = service.e2_trend(&FeatureVectors::assemble(&FeatureInput::new()));

        assert_eq!(chart.markers.len(), 1);
        assert!(chart.markers[0].value.abs() < f64::EPSILON);
        assert_eq!(chart.markers[0].percentile_rank, Some(0));
    }

    #[test]
    fn test_baseline_requires_reference() {
        let service = service_with(BTreeMap::new());
        let input = FeatureInput::new().with(BASELINE_E2_KEY, 45.0);
        assert!(service.baseline(&FeatureVectors::assemble(&input)).is_none());
    }

    #[test]
    fn test_baseline_against_raw_sample() {
        let service = service_with(BTreeMap::from([(
            BASELINE_REFERENCE_KEY.to_string(),
            ReferenceDistribution::raw([20.0, 30.0, 40.0, 50.0, 60.0]),
        )]));
        let input = FeatureInput::new().with(BASELINE_E2_KEY, 45.0);
        let chart = service
            .baseline(&FeatureVectors::assemble(&input))
            .expect("baseline chart");

        assert_eq!(chart.percentile_rank, Some(60));
        assert_eq!(chart.median, Some(40.0));
        assert_eq!(
            chart.explanation(),
            "Your baseline E2 value is 45 pg/mL, at about P60."
        );
    }
}
