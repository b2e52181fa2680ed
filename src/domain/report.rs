//! Display-agnostic output of one assessment.
//!
//! Renderers (TUI, JSON) consume these values; none of them compute statistics.

use serde::{Deserialize, Serialize};

use super::features::FeatureVectors;
use super::prediction::PredictionResult;

/// Interquartile reference band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub p25: f64,
    pub p75: f64,
}

impl From<(f64, f64)> for Band {
    fn from((p25, p75): (f64, f64)) -> Self {
        Self { p25, p75 }
    }
}

/// One monitoring round placed against its reference distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundMarker {
    /// Monitoring round, starting at 1
    pub round: usize,
    /// Input column of this round's E2
    pub key: String,
    /// Axis label
    pub label: String,
    /// Observed E2 (pg/mL) after imputation
    pub value: f64,
    pub band: Option<Band>,
    pub median: Option<f64>,
    pub percentile_rank: Option<u8>,
}

impl RoundMarker {
    /// Point annotation, e.g. `250 (P40)`.
    #[must_use]
    pub fn annotation(&self) -> String {
        match self.percentile_rank {
            Some(pr) => format!("{:.0} (P{pr})", self.value),
            None => format!("{:.0}", self.value),
        }
    }

    /// Explanation line for the percentile summary.
    #[must_use]
    pub fn explanation(&self) -> String {
        match self.percentile_rank {
            Some(pr) => format!("{}: {:.0} pg/mL, at P{pr}", self.key, self.value),
            None => format!("{}: {:.0} pg/mL (reference P25–P75)", self.key, self.value),
        }
    }
}

/// Serum E2 across monitoring rounds. Rounds without reference data are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct E2TrendChart {
    pub markers: Vec<RoundMarker>,
}

impl E2TrendChart {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Explanation lines, one per plotted round.
    #[must_use]
    pub fn explanations(&self) -> Vec<String> {
        self.markers.iter().map(RoundMarker::explanation).collect()
    }
}

/// Baseline E2 against its reference distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineChart {
    /// Observed baseline E2 (pg/mL) after imputation
    pub value: f64,
    pub band: Option<Band>,
    pub median: Option<f64>,
    pub percentile_rank: Option<u8>,
}

impl BaselineChart {
    #[must_use]
    pub fn explanation(&self) -> String {
        match self.percentile_rank {
            Some(pr) => format!(
                "Your baseline E2 value is {:.0} pg/mL, at about P{pr}.",
                self.value
            ),
            None => format!(
                "Your baseline E2 value is {:.0} pg/mL (reference P25–P75).",
                self.value
            ),
        }
    }
}

/// Shown in place of the baseline chart when it cannot be drawn.
pub const BASELINE_UNAVAILABLE: &str =
    "Baseline E2 missing or no reference data available, cannot display percentile plot.";

/// Everything produced for one form submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: String,
    pub features: FeatureVectors,
    pub prediction: PredictionResult,
    pub e2_trend: E2TrendChart,
    pub baseline: Option<BaselineChart>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Assessment {
    #[must_use]
    pub fn new(
        features: FeatureVectors,
        prediction: PredictionResult,
        e2_trend: E2TrendChart,
        baseline: Option<BaselineChart>,
    ) -> Self {
        Self {
            id: uuid_v4(),
            features,
            prediction,
            e2_trend,
            baseline,
            created_at: chrono::Utc::now(),
        }
    }

    /// Baseline explanation, or the warning when no chart is available.
    #[must_use]
    pub fn baseline_explanation(&self) -> String {
        self.baseline
            .as_ref()
            .map_or_else(|| BASELINE_UNAVAILABLE.to_string(), BaselineChart::explanation)
    }
}

/// Random (v4) UUID from a ChaCha20 CSPRNG seeded by the OS.
fn uuid_v4() -> String {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let mut bytes: [u8; 16] = rng.gen();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
