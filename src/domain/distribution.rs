//! Reference distributions and percentile statistics.
//!
//! A reference entry is either a precomputed quartile summary or a raw sample.
//! Raw samples are cleaned of non-finite values before any statistic is taken.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One reference-population entry as exported upstream.
///
/// JSON objects deserialize to `Summary`, JSON arrays to `RawSample`
/// (`null` elements stand for NaN).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferenceDistribution {
    // Listed first: a struct variant would also accept a JSON array positionally.
    RawSample(Vec<Option<f64>>),
    Summary {
        #[serde(default)]
        p25: Option<f64>,
        #[serde(default)]
        p50: Option<f64>,
        #[serde(default)]
        p75: Option<f64>,
    },
}

impl ReferenceDistribution {
    /// Build a raw sample from plain floats (NaN allowed).
    #[must_use]
    pub fn raw(values: impl IntoIterator<Item = f64>) -> Self {
        Self::RawSample(values.into_iter().map(Some).collect())
    }
}

/// Linear-interpolation rule used for quartiles of a raw sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantileMethod {
    /// Hazen rule: position `n*q - 0.5`, clamped to the sample ends.
    #[default]
    Midpoint,
    /// Position `(n-1)*q` (NumPy's default).
    Inclusive,
}

impl std::str::FromStr for QuantileMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "midpoint" | "hazen" => Ok(Self::Midpoint),
            "inclusive" | "linear" | "numpy" => Ok(Self::Inclusive),
            other => Err(format!("Unknown quantile method: {other}")),
        }
    }
}

/// Quartiles of a reference entry plus the cleaned sample, when one exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistStats {
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    /// Finite sample values in their original order; `None` for summaries.
    pub values: Option<Vec<f64>>,
}

impl DistStats {
    /// The P25–P75 band, if both ends are known.
    #[must_use]
    pub fn band(&self) -> Option<(f64, f64)> {
        match (self.p25, self.p75) {
            (Some(lo), Some(hi)) => Some((lo, hi)),
            _ => None,
        }
    }

    /// Percentile rank of `x` against the retained sample.
    #[must_use]
    pub fn rank(&self, x: f64) -> Option<u8> {
        percentile_rank(self.values.as_deref(), x)
    }
}

/// Extract quartile statistics from a reference entry.
///
/// Returns `None` when there is no entry, or when a raw sample has no finite
/// values left after cleaning. Callers must skip plotting and ranking then.
#[must_use]
pub fn dist_stats(dist: Option<&ReferenceDistribution>, method: QuantileMethod) -> Option<DistStats> {
    match dist? {
        ReferenceDistribution::Summary { p25, p50, p75 } => Some(DistStats {
            p25: *p25,
            p50: *p50,
            p75: *p75,
            values: None,
        }),
        ReferenceDistribution::RawSample(raw) => {
            let cleaned: Vec<f64> = raw
                .iter()
                .filter_map(|v| *v)
                .filter(|v| v.is_finite())
                .collect();
            if cleaned.is_empty() {
                return None;
            }

            let mut sorted = cleaned.clone();
            sorted.sort_by(f64::total_cmp);

            Some(DistStats {
                p25: Some(quantile_sorted(&sorted, 0.25, method)),
                p50: Some(quantile_sorted(&sorted, 0.50, method)),
                p75: Some(quantile_sorted(&sorted, 0.75, method)),
                values: Some(cleaned),
            })
        }
    }
}

/// Quantile `q` in [0, 1] of an ascending, non-empty slice.
fn quantile_sorted(sorted: &[f64], q: f64, method: QuantileMethod) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }

    let pos = match method {
        QuantileMethod::Midpoint => n as f64 * q - 0.5,
        QuantileMethod::Inclusive => (n - 1) as f64 * q,
    };
    let pos = pos.clamp(0.0, (n - 1) as f64);

    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Percentile rank of `x` within `reference`, as an integer in [0, 100].
///
/// Counts only values strictly below `x`, so ties do not raise the rank.
/// The ratio is rounded half-to-even. Returns `None` when there is no
/// reference (or it is empty) or `x` is NaN.
#[must_use]
pub fn percentile_rank(reference: Option<&[f64]>, x: f64) -> Option<u8> {
    let reference = reference?;
    if reference.is_empty() || x.is_nan() {
        return None;
    }

    let below = reference.iter().filter(|v| **v < x).count();
    let pct = (below as f64 / reference.len() as f64) * 100.0;
    Some(pct.round_ties_even() as u8)
}

/// Reference distributions keyed by field, with stats resolved at load time.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    stats: BTreeMap<String, DistStats>,
    method: QuantileMethod,
}

impl ReferenceTable {
    /// Resolve every entry once. Entries without usable data are dropped.
    #[must_use]
    pub fn new(entries: BTreeMap<String, ReferenceDistribution>, method: QuantileMethod) -> Self {
        let mut stats = BTreeMap::new();
        for (key, dist) in &entries {
            match dist_stats(Some(dist), method) {
                Some(s) => {
                    stats.insert(key.clone(), s);
                }
                None => tracing::warn!("Reference distribution for {key} has no finite values; skipping"),
            }
        }

        tracing::debug!(
            "Resolved {} of {} reference distributions ({:?})",
            stats.len(),
            entries.len(),
            method
        );

        Self { stats, method }
    }

    /// Stats for a field, or `None` when no reference data is available.
    #[must_use]
    pub fn stats(&self, key: &str) -> Option<&DistStats> {
        self.stats.get(key)
    }

    #[must_use]
    pub fn method(&self) -> QuantileMethod {
        self.method
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_raw_sample_quartiles_midpoint() {
        let dist = ReferenceDistribution::raw([f64::NAN, 10.0, 20.0, 30.0, 40.0]);
        let stats = dist_stats(Some(&dist), QuantileMethod::Midpoint).expect("has stats");

        assert!(close(stats.p25.unwrap(), 15.0));
        assert!(close(stats.p50.unwrap(), 25.0));
        assert!(close(stats.p75.unwrap(), 35.0));
        assert_eq!(stats.values.as_ref().unwrap().len(), 4);
    }

    #[test]
    fn test_raw_sample_quartiles_inclusive() {
        let dist = ReferenceDistribution::raw([40.0, 10.0, 30.0, 20.0]);
        let stats = dist_stats(Some(&dist), QuantileMethod::Inclusive).expect("has stats");

        assert!(close(stats.p25.unwrap(), 17.5));
        assert!(close(stats.p50.unwrap(), 25.0));
        assert!(close(stats.p75.unwrap(), 32.5));
        // Cleaned sample keeps input order.
        assert_eq!(stats.values.unwrap(), vec![40.0, 10.0, 30.0, 20.0]);
    }

    #[test]
    fn test_single_value_sample() {
        let dist = ReferenceDistribution::raw([42.0]);
        for method in [QuantileMethod::Midpoint, QuantileMethod::Inclusive] {
            let stats = dist_stats(Some(&dist), method).unwrap();
            assert_eq!(stats.p25, Some(42.0));
            assert_eq!(stats.p75, Some(42.0));
        }
    }

    #[test]
    fn test_all_nan_or_empty_is_no_stats() {
        let all_nan = ReferenceDistribution::raw([f64::NAN, f64::NAN]);
        assert!(dist_stats(Some(&all_nan), QuantileMethod::Midpoint).is_none());

        let infinite = ReferenceDistribution::raw([f64::INFINITY, f64::NEG_INFINITY]);
        assert!(dist_stats(Some(&infinite), QuantileMethod::Midpoint).is_none());

        let empty = ReferenceDistribution::RawSample(vec![]);
        assert!(dist_stats(Some(&empty), QuantileMethod::Midpoint).is_none());

        assert!(dist_stats(None, QuantileMethod::Midpoint).is_none());
    }

    #[test]
    fn test_summary_passes_through_without_sample() {
        let dist = ReferenceDistribution::Summary {
            p25: Some(120.0),
            p50: None,
            p75: Some(480.0),
        };
        let stats = dist_stats(Some(&dist), QuantileMethod::Midpoint).unwrap();

        assert_eq!(stats.p25, Some(120.0));
        assert_eq!(stats.p50, None);
        assert_eq!(stats.p75, Some(480.0));
        assert!(stats.values.is_none());
        assert_eq!(stats.band(), Some((120.0, 480.0)));
        assert_eq!(stats.rank(300.0), None);
    }

    #[test]
    fn test_rank_tie_uses_strict_less_than() {
        let reference = [10.0, 20.0, 20.0, 30.0];
        assert_eq!(percentile_rank(Some(&reference), 20.0), Some(25));
    }

    #[test]
    fn test_rank_bounds_and_null_cases() {
        let reference = [10.0, 20.0, 30.0];
        assert_eq!(percentile_rank(Some(&reference), 5.0), Some(0));
        assert_eq!(percentile_rank(Some(&reference), 100.0), Some(100));
        assert_eq!(percentile_rank(Some(&reference), f64::NAN), None);
        assert_eq!(percentile_rank(None, 10.0), None);
        assert_eq!(percentile_rank(Some(&[]), 10.0), None);
    }

    #[test]
    fn test_rank_rounds_half_to_even() {
        // 1/8 = 12.5% and 3/8 = 37.5%
        let reference = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(percentile_rank(Some(&reference), 1.5), Some(12));
        assert_eq!(percentile_rank(Some(&reference), 3.5), Some(38));
    }

    #[test]
    fn test_rank_is_non_decreasing() {
        let reference = [3.0, 9.0, 9.0, 14.0, 27.0, 27.0, 27.0, 51.0, 80.0];
        let mut last = 0u8;
        let mut x = -10.0;
        while x < 100.0 {
            let r = percentile_rank(Some(&reference), x).unwrap();
            assert!(r <= 100);
            assert!(r >= last, "rank dropped at x={x}");
            last = r;
            x += 0.5;
        }
    }

    #[test]
    fn test_reference_json_variants() {
        let json = r#"{
            "血E2_1": [100.0, null, 300.0],
            "基础E2": {"p25": 30.0, "p50": 45.0, "p75": 60.0},
            "血E2_3": [null]
        }"#;
        let entries: BTreeMap<String, ReferenceDistribution> = serde_json::from_str(json).unwrap();
        assert!(matches!(entries["血E2_1"], ReferenceDistribution::RawSample(_)));
        assert!(matches!(entries["基础E2"], ReferenceDistribution::Summary { .. }));

        let table = ReferenceTable::new(entries, QuantileMethod::Midpoint);
        assert_eq!(table.len(), 2);
        assert_eq!(table.stats("血E2_1").unwrap().values.as_ref().unwrap().len(), 2);
        assert!(table.stats("血E2_3").is_none());
        assert!(table.stats("血E2_2").is_none());
    }

    #[test]
    fn test_quantile_method_parse() {
        assert_eq!("Hazen".parse::<QuantileMethod>(), Ok(QuantileMethod::Midpoint));
        assert_eq!("numpy".parse::<QuantileMethod>(), Ok(QuantileMethod::Inclusive));
        assert!("cubic".parse::<QuantileMethod>().is_err());
    }
}
