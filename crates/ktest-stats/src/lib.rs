//! Statistical functions for benchmark samples.
//!
//! Pure math: quantiles, Tukey-fence outlier rejection and the per-series summary the
//! comparator consumes. No I/O, no allocation beyond sorted copies.

use ktest_types::MetricSummary;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatsError {
    #[error("no samples to summarize")]
    NoSamples,
}

/// Tukey fence multiplier.
const IQR_FENCE: f64 = 1.5;

pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator); 0 for fewer than two values.
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (values.len() - 1) as f64
}

/// Quantile of an already sorted slice, Hyndman-Fan definition 8.
///
/// Approximately median-unbiased regardless of the distribution, which is what the
/// outlier fences want for the small repeat counts benchmarks produce.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let len = sorted.len();
    let n = q * (len as f64 + 1.0 / 3.0) + 1.0 / 3.0;
    let k = n.floor();
    let frac = n - k;
    if k <= 0.0 {
        return sorted[0];
    }
    let k = k as usize;
    if k >= len {
        return sorted[len - 1];
    }
    sorted[k - 1] + frac * (sorted[k] - sorted[k - 1])
}

/// Values inside `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`, in their original order.
pub fn discard_outliers(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let s = sorted(values);
    let q1 = quantile(&s, 0.25);
    let q3 = quantile(&s, 0.75);
    let lo = q1 - IQR_FENCE * (q3 - q1);
    let hi = q3 + IQR_FENCE * (q3 - q1);
    values
        .iter()
        .copied()
        .filter(|v| *v >= lo && *v <= hi)
        .collect()
}

pub fn summarize(unit: &str, values: &[f64]) -> Result<MetricSummary, StatsError> {
    let retained = discard_outliers(values);
    if retained.is_empty() {
        return Err(StatsError::NoSamples);
    }
    let min = retained
        .iter()
        .copied()
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .ok_or(StatsError::NoSamples)?;
    let max = retained
        .iter()
        .copied()
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .ok_or(StatsError::NoSamples)?;
    Ok(MetricSummary {
        unit: unit.to_string(),
        values: values.to_vec(),
        mean: mean(&retained),
        retained,
        min,
        max,
    })
}

/// Geometric mean of strictly positive values; `None` if any value is not.
pub fn geomean(values: &[f64]) -> Option<f64> {
    if values.is_empty() || values.iter().any(|v| *v <= 0.0) {
        return None;
    }
    let log_sum: f64 = values.iter().map(|v| v.ln()).sum();
    Some((log_sum / values.len() as f64).exp())
}

/// Largest relative distance of min or max from the mean.
pub fn relative_spread(summary: &MetricSummary) -> f64 {
    if summary.mean == 0.0 || (summary.min == 0.0 && summary.max == 0.0) {
        return 0.0;
    }
    let below = 1.0 - summary.min / summary.mean;
    let above = summary.max / summary.mean - 1.0;
    below.max(above)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn quantile_r8_matches_reference_values() {
        let xs: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_relative_eq!(quantile(&xs, 0.25), 2.0 + 11.0 / 12.0, epsilon = 1e-9);
        assert_relative_eq!(quantile(&xs, 0.75), 8.0 + 1.0 / 12.0, epsilon = 1e-9);
        assert_relative_eq!(quantile(&xs, 0.5), 5.5, epsilon = 1e-9);
    }

    #[test]
    fn quantile_clamps_at_the_edges() {
        let xs = [3.0, 7.0];
        assert_eq!(quantile(&xs, 0.0), 3.0);
        assert_eq!(quantile(&xs, 1.0), 7.0);
    }

    #[test]
    fn discard_outliers_drops_a_spike() {
        let kept = discard_outliers(&[10.0, 10.0, 11.0, 10.0, 9.0, 100.0]);
        assert_eq!(kept, vec![10.0, 10.0, 11.0, 10.0, 9.0]);
    }

    #[test]
    fn summarize_uses_retained_values() {
        let s = summarize("ns/op", &[10.0, 10.0, 11.0, 10.0, 9.0, 100.0]).unwrap();
        assert_eq!(s.values.len(), 6);
        assert_eq!(s.retained.len(), 5);
        assert_eq!(s.min, 9.0);
        assert_eq!(s.max, 11.0);
        assert_relative_eq!(s.mean, 10.0);
    }

    #[test]
    fn summarize_empty_is_an_error() {
        assert_eq!(summarize("ns/op", &[]), Err(StatsError::NoSamples));
    }

    #[test]
    fn geomean_of_powers_of_two() {
        assert_relative_eq!(geomean(&[2.0, 8.0]).unwrap(), 4.0, epsilon = 1e-12);
        assert_eq!(geomean(&[2.0, 0.0]), None);
        assert_eq!(geomean(&[]), None);
    }

    #[test]
    fn relative_spread_takes_the_wider_side() {
        let s = summarize("ns/op", &[90.0, 100.0, 120.0]).unwrap();
        let mean = (90.0 + 100.0 + 120.0) / 3.0;
        assert_relative_eq!(relative_spread(&s), 120.0 / mean - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn variance_of_constant_is_zero() {
        assert_eq!(variance(&[4.0, 4.0, 4.0]), 0.0);
        assert_eq!(variance(&[4.0]), 0.0);
        assert_relative_eq!(variance(&[1.0, 2.0, 3.0, 4.0]), 5.0 / 3.0, epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn summary_bounds_hold(values in prop::collection::vec(0.0f64..1e9, 1..50)) {
            let s = summarize("ns/op", &values).unwrap();
            prop_assert!(!s.retained.is_empty());
            prop_assert!(s.min <= s.mean + 1e-6);
            prop_assert!(s.mean <= s.max + 1e-6);
            prop_assert!(s.retained.iter().all(|v| values.contains(v)));
        }

        #[test]
        fn quantile_is_monotone(
            values in prop::collection::vec(-1e6f64..1e6, 1..40),
            a in 0.0f64..1.0,
            b in 0.0f64..1.0,
        ) {
            let s = sorted(&values);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(quantile(&s, lo) <= quantile(&s, hi) + 1e-9);
        }
    }
}
