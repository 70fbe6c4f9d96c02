//! Statistical building blocks for the analysis engine.
//!
//! - [`correlation`] — pairwise-complete Pearson correlation accumulators
//! - [`outlier`] — robust (median/MAD) outlier detection

pub mod correlation;
pub mod outlier;

pub use correlation::{PairAccumulator, PairSet};
pub use outlier::{robust_outliers, OutlierStats};
