//! Band/row selection for MinHash LSH.
//!
//! Splitting a `k`-value signature into `b` bands of `r` rows makes the
//! probability that two sets with Jaccard similarity `s` share at least one
//! bucket follow the S-curve
//!
//!   P(s) = 1 - (1 - s^r)^b
//!
//! A good `(b, r)` makes that curve approximate a step at the threshold `t`:
//! pairs below `t` rarely collide (false positives) and pairs above `t` rarely
//! miss (false negatives).

use crate::error::{LshError, Result};

/// Step width of the numerical integration over similarity.
const INTEGRATION_PRECISION: f64 = 0.001;

/// Relative weight of each error kind in the tuning objective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorWeights {
    pub false_positive: f64,
    pub false_negative: f64,
}

impl Default for ErrorWeights {
    fn default() -> Self {
        Self {
            false_positive: 0.5,
            false_negative: 0.5,
        }
    }
}

impl ErrorWeights {
    pub(crate) fn validate(&self) -> Result<()> {
        let finite = self.false_positive.is_finite() && self.false_negative.is_finite();
        if !finite || self.false_positive < 0.0 || self.false_negative < 0.0 {
            return Err(LshError::InvalidConfig(format!(
                "error weights must be non-negative, got {self:?}"
            )));
        }
        if self.false_positive + self.false_negative == 0.0 {
            return Err(LshError::InvalidConfig(
                "error weights must not both be zero".into(),
            ));
        }
        Ok(())
    }
}

/// Banding configuration chosen for an index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandingParams {
    /// Number of bands (`b`), one hash table each.
    pub num_bands: usize,
    /// Signature values per band (`r`).
    pub rows_per_band: usize,
    /// Probability mass of collisions for similarities below the threshold.
    pub false_positive: f64,
    /// Probability mass of misses for similarities above the threshold.
    pub false_negative: f64,
}

impl BandingParams {
    /// Evaluate a fixed `(b, r)` against a threshold.
    pub fn evaluate(threshold: f64, num_bands: usize, rows_per_band: usize) -> Self {
        Self {
            num_bands,
            rows_per_band,
            false_positive: false_positive_probability(threshold, num_bands, rows_per_band),
            false_negative: false_negative_probability(threshold, num_bands, rows_per_band),
        }
    }

    /// Signature dimension covered by this banding.
    pub fn dimension(&self) -> usize {
        self.num_bands * self.rows_per_band
    }

    /// Similarity at which the S-curve is steepest, roughly `(1/b)^(1/r)`.
    pub fn approximate_threshold(&self) -> f64 {
        (1.0 / self.num_bands as f64).powf(1.0 / self.rows_per_band as f64)
    }
}

/// Probability that two sets with similarity `s` share at least one bucket.
pub fn collision_probability(s: f64, num_bands: usize, rows_per_band: usize) -> f64 {
    1.0 - (1.0 - s.powi(rows_per_band as i32)).powi(num_bands as i32)
}

/// Integral of the collision probability over `[0, threshold]`.
pub fn false_positive_probability(threshold: f64, num_bands: usize, rows_per_band: usize) -> f64 {
    integrate(
        |s| collision_probability(s, num_bands, rows_per_band),
        0.0,
        threshold,
    )
}

/// Integral of the miss probability over `[threshold, 1]`.
pub fn false_negative_probability(threshold: f64, num_bands: usize, rows_per_band: usize) -> f64 {
    integrate(
        |s| 1.0 - collision_probability(s, num_bands, rows_per_band),
        threshold,
        1.0,
    )
}

/// Midpoint rule with a fixed step width.
fn integrate(f: impl Fn(f64) -> f64, a: f64, b: f64) -> f64 {
    if b <= a {
        return 0.0;
    }
    let steps = ((b - a) / INTEGRATION_PRECISION).ceil().max(1.0) as usize;
    let width = (b - a) / steps as f64;
    (0..steps)
        .map(|i| f(a + (i as f64 + 0.5) * width) * width)
        .sum()
}

/// Choose `(b, r)` with `b * r == dim` minimising the weighted sum of false
/// positive and false negative probability at `threshold`.
///
/// Every divisor pair of `dim` is considered. On ties the configuration with
/// more bands wins.
pub fn optimal_params(dim: usize, threshold: f64, weights: ErrorWeights) -> Result<BandingParams> {
    if dim == 0 {
        return Err(LshError::ZeroDimension);
    }
    if !(threshold > 0.0 && threshold < 1.0) {
        return Err(LshError::InvalidThreshold(threshold));
    }
    weights.validate()?;

    let mut best: Option<(f64, BandingParams)> = None;
    // r ascending means b descending, so a strict comparison keeps the
    // larger band count on ties.
    for rows in (1..=dim).filter(|r| dim % r == 0) {
        let params = BandingParams::evaluate(threshold, dim / rows, rows);
        let error = weights.false_positive * params.false_positive
            + weights.false_negative * params.false_negative;
        match best {
            Some((best_error, _)) if error >= best_error => {}
            _ => best = Some((error, params)),
        }
    }

    // dim > 0 always has the divisor 1.
    best.map(|(_, params)| params)
        .ok_or_else(|| LshError::InvalidConfig(format!("no banding for dimension {dim}")))
}
