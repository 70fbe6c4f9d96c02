//! Robust outlier detection via MAD-based z-scores.
//!
//! The robust z-score `0.6745 * (x - median) / MAD` resists the very
//! outliers it is used to detect, unlike a mean/std-based score. It needs
//! the full value list (median and MAD are not streamable), which is the
//! one deliberate memory/accuracy tradeoff in the engine; callers release
//! the buffer as soon as the computation finishes.

use serde::{Deserialize, Serialize};

/// Consistency constant relating MAD to the standard deviation of a
/// normal distribution.
const MAD_SCALE: f64 = 0.6745;

/// Outlier summary for one numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierStats {
    /// Values with robust |z| above the threshold.
    pub count: usize,
    /// Maximum robust |z| observed across all values.
    pub max_abs_z: f64,
    /// Threshold the count was taken against.
    pub threshold: f64,
}

/// Flags values whose robust z-score exceeds the threshold.
///
/// A zero MAD (no dispersion) reports zero outliers. The caller is
/// responsible for the minimum-sample gate; this function scores whatever
/// it is given.
pub fn robust_outliers(values: &[f64], threshold: f64) -> OutlierStats {
    let (median, mad) = median_mad(values);
    let mut count = 0;
    let mut max_abs_z = 0.0_f64;
    if mad > 0.0 {
        for &v in values {
            let z = (MAD_SCALE * (v - median) / mad).abs();
            if z > threshold {
                count += 1;
            }
            if z > max_abs_z {
                max_abs_z = z;
            }
        }
    }
    OutlierStats {
        count,
        max_abs_z,
        threshold,
    }
}

/// Computes the median and the median absolute deviation of `values`.
pub(crate) fn median_mad(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = quantile(&sorted, 0.5);
    let mut deviations: Vec<f64> = sorted.iter().map(|v| (v - median).abs()).collect();
    deviations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mad = quantile(&deviations, 0.5);
    (median, mad)
}

/// Linear-interpolation quantile over pre-sorted data.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if q <= 0.0 {
        return sorted[0];
    }
    if q >= 1.0 {
        return sorted[sorted.len() - 1];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let w = pos - lo as f64;
    sorted[lo] * (1.0 - w) + sorted[hi] * w
}
