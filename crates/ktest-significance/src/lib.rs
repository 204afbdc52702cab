//! Statistical significance tests for benchmark comparisons.
//!
//! Both tests are two-sided and return a p-value. Failures that make a test meaningless
//! (too few samples, no variance, identical inputs) are errors so the caller can print
//! them as a note instead of a p-value.

use ktest_types::DeltaTest;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignificanceError {
    #[error("too few samples")]
    SampleSize,

    #[error("zero variance")]
    ZeroVariance,

    #[error("all equal")]
    SamplesEqual,
}

/// Both sides need at least this many samples before any test runs.
pub const MIN_SAMPLES: usize = 2;

/// Largest side length for which the exact U distribution is enumerated.
const EXACT_U_LIMIT: usize = 20;

/// Run the selected test. `DeltaTest::None` yields `Ok(None)`.
pub fn p_value(test: DeltaTest, old: &[f64], new: &[f64]) -> Result<Option<f64>, SignificanceError> {
    if test == DeltaTest::None {
        return Ok(None);
    }
    if old.len() < MIN_SAMPLES || new.len() < MIN_SAMPLES {
        return Err(SignificanceError::SampleSize);
    }
    match test {
        DeltaTest::UTest => mann_whitney_u(old, new).map(Some),
        DeltaTest::TTest => welch_t_test(old, new).map(Some),
        DeltaTest::None => Ok(None),
    }
}

/// Two-sided Mann-Whitney U test.
///
/// Tie-free samples with at most 20 values per side use the exact null distribution;
/// everything else uses the normal approximation with tie and continuity correction.
pub fn mann_whitney_u(x: &[f64], y: &[f64]) -> Result<f64, SignificanceError> {
    if x.is_empty() || y.is_empty() {
        return Err(SignificanceError::SampleSize);
    }
    let (n1, n2) = (x.len(), y.len());
    let n = n1 + n2;

    let mut all: Vec<(f64, bool)> = x
        .iter()
        .map(|v| (*v, true))
        .chain(y.iter().map(|v| (*v, false)))
        .collect();
    all.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut rank_sum_x = 0.0;
    let mut tie_term = 0.0;
    let mut has_ties = false;
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && all[j].0 == all[i].0 {
            j += 1;
        }
        if j - i == n {
            return Err(SignificanceError::SamplesEqual);
        }
        // ranks i+1..=j share their average
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        rank_sum_x += all[i..j].iter().filter(|(_, from_x)| *from_x).count() as f64 * avg_rank;
        if j - i > 1 {
            has_ties = true;
            let t = (j - i) as f64;
            tie_term += t * t * t - t;
        }
        i = j;
    }

    let u1 = rank_sum_x - (n1 * (n1 + 1)) as f64 / 2.0;

    if !has_ties && n1 <= EXACT_U_LIMIT && n2 <= EXACT_U_LIMIT {
        return Ok(exact_u_p_value(u1.round() as usize, n1, n2));
    }

    let nf = n as f64;
    let mu = (n1 * n2) as f64 / 2.0;
    let var = (n1 * n2) as f64 / 12.0 * ((nf + 1.0) - tie_term / (nf * (nf - 1.0)));
    if var <= 0.0 {
        return Err(SignificanceError::SamplesEqual);
    }
    let z = ((u1 - mu).abs() - 0.5).max(0.0) / var.sqrt();
    let normal = Normal::new(0.0, 1.0).map_err(|_| SignificanceError::SamplesEqual)?;
    let p = 2.0 * (1.0 - normal.cdf(z));
    Ok(p.clamp(0.0, 1.0))
}

fn exact_u_p_value(u: usize, n1: usize, n2: usize) -> f64 {
    let counts = u_distribution(n1, n2);
    let total: f64 = counts.iter().sum();
    let below: f64 = counts.iter().take(u + 1).sum();
    let above: f64 = counts.iter().skip(u).sum();
    (2.0 * below.min(above) / total).min(1.0)
}

/// Number of orderings of `n1` x-values and `n2` y-values for each value of U.
///
/// c(u; m, n) = c(u - n; m - 1, n) + c(u; m, n - 1): the largest element either comes
/// from x (and beats all n y-values) or from y.
fn u_distribution(n1: usize, n2: usize) -> Vec<f64> {
    let mut prev: Vec<Vec<f64>> = vec![vec![1.0]; n2 + 1];
    for m in 1..=n1 {
        let mut cur: Vec<Vec<f64>> = Vec::with_capacity(n2 + 1);
        cur.push(vec![1.0]);
        for n in 1..=n2 {
            let len = m * n + 1;
            let row: Vec<f64> = (0..len)
                .map(|u| {
                    let from_x = if u >= n {
                        prev[n].get(u - n).copied().unwrap_or(0.0)
                    } else {
                        0.0
                    };
                    let from_y = cur[n - 1].get(u).copied().unwrap_or(0.0);
                    from_x + from_y
                })
                .collect();
            cur.push(row);
        }
        prev = cur;
    }
    prev.pop().unwrap_or_else(|| vec![1.0])
}

/// Two-sided Welch's t-test (unequal variances).
pub fn welch_t_test(x: &[f64], y: &[f64]) -> Result<f64, SignificanceError> {
    if x.len() < MIN_SAMPLES || y.len() < MIN_SAMPLES {
        return Err(SignificanceError::SampleSize);
    }
    let (n1, n2) = (x.len() as f64, y.len() as f64);
    let (m1, m2) = (mean(x), mean(y));
    let v1 = variance(x, m1) / n1;
    let v2 = variance(y, m2) / n2;
    if v1 + v2 == 0.0 {
        return Err(SignificanceError::ZeroVariance);
    }
    let t = (m1 - m2) / (v1 + v2).sqrt();
    let dof = (v1 + v2).powi(2) / (v1 * v1 / (n1 - 1.0) + v2 * v2 / (n2 - 1.0));
    let dist = StudentsT::new(0.0, 1.0, dof).map_err(|_| SignificanceError::ZeroVariance)?;
    let p = 2.0 * (1.0 - dist.cdf(t.abs()));
    Ok(p.clamp(0.0, 1.0))
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn variance(xs: &[f64], mean: f64) -> f64 {
    xs.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (xs.len() - 1) as f64
}
