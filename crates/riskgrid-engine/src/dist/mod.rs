//! Monte-Carlo sampling primitives: the deterministic generator, per-family
//! sample generation, and moment fitting used to re-parameterise results.

mod rng;

pub use rng::{standard_normal, SeededRng};

/// z-score for a two-sided confidence level, from the published table.
///
/// Unknown levels fall back to the 90% score.
#[must_use]
pub fn z_score(confidence: f64) -> f64 {
    if (confidence - 95.0).abs() < f64::EPSILON {
        1.96
    } else if (confidence - 99.0).abs() < f64::EPSILON {
        2.576
    } else {
        1.645
    }
}

/// Draw `n` samples from `N(mean, variance)`.
#[must_use]
pub fn gaussian_samples(mean: f64, variance: f64, n: usize, rng: &mut SeededRng) -> Vec<f64> {
    let sigma = variance.max(0.0).sqrt();
    (0..n)
        .map(|_| standard_normal(rng) * sigma + mean)
        .collect()
}

/// Draw `n` samples from a log-normal whose underlying normal is
/// `N(mu, sigma_sq)`.
#[must_use]
pub fn lognormal_samples(mu: f64, sigma_sq: f64, n: usize, rng: &mut SeededRng) -> Vec<f64> {
    let sigma = sigma_sq.max(0.0).sqrt();
    (0..n)
        .map(|_| (standard_normal(rng) * sigma + mu).exp())
        .collect()
}

/// Draw `n` samples from `U(lo, hi)` over the half-open interval.
#[must_use]
pub fn uniform_samples(lo: f64, hi: f64, n: usize, rng: &mut SeededRng) -> Vec<f64> {
    (0..n).map(|_| lo + (hi - lo) * rng.next_f64()).collect()
}

/// A constant-filled vector, used to lift scalars into sample space.
#[must_use]
pub fn constant_samples(value: f64, n: usize) -> Vec<f64> {
    vec![value; n]
}

/// Arithmetic mean. Zero for an empty slice.
#[must_use]
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Unbiased sample variance (n − 1 denominator). Zero below two samples.
#[must_use]
pub fn variance(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let m = mean(samples);
    let sum_sq: f64 = samples.iter().map(|x| (x - m) * (x - m)).sum();
    sum_sq / (samples.len() as f64 - 1.0)
}

/// Fit a normal by moments: `(mean, variance)`.
#[must_use]
pub fn fit_normal(samples: &[f64]) -> (f64, f64) {
    (mean(samples), variance(samples))
}

/// Fit a log-normal by moments in log space.
///
/// Returns `None` when any sample is non-positive; callers fall back to the
/// `Sampled` family in that case.
#[must_use]
pub fn fit_lognormal(samples: &[f64]) -> Option<(f64, f64)> {
    if samples.iter().any(|&x| x <= 0.0) {
        return None;
    }
    let logs: Vec<f64> = samples.iter().map(|x| x.ln()).collect();
    Some((mean(&logs), variance(&logs)))
}

/// Fit a uniform by range: `(min, max)`, widened by ±0.5 when the samples
/// collapse to a point.
#[must_use]
pub fn fit_uniform(samples: &[f64]) -> (f64, f64) {
    let lo = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !lo.is_finite() || !hi.is_finite() {
        return (-0.5, 0.5);
    }
    if lo == hi {
        return (lo - 0.5, hi + 0.5);
    }
    (lo, hi)
}

/// Median of an unsorted slice (interpolated between middle elements).
#[must_use]
pub fn median(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}
