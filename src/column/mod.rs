//! Per-column streaming accumulation and type inference.
//!
//! One [`ColumnAccumulator`] is created per column when the header is read,
//! mutated row-by-row, and finalized exactly once into a
//! [`ColumnSummary`]. Numeric statistics use Welford's online algorithm so
//! a column of any length costs O(1) extra memory here; only outlier
//! detection (done at finalize time from a caller-held buffer) needs the
//! materialized values.

use std::collections::HashMap;

use crate::analyzer::Options;
use crate::locale;
use crate::report::{CategoryCount, ColumnKind, ColumnSummary};
use crate::stats::robust_outliers;

/// Distinct keys tracked per categorical histogram before further new
/// values are dropped.
const CATEGORY_CAP: usize = 10_000;
/// Longest value counted as a category.
const CATEGORY_MAX_LEN: usize = 64;
/// Example text values kept per column.
const EXAMPLES_KEPT: usize = 3;
/// Top categorical values reported.
const TOP_VALUES_KEPT: usize = 8;
/// Minimum numeric sample for outlier detection.
const OUTLIER_MIN_SAMPLE: usize = 8;
/// Robust z-score threshold used when the configured one is not positive.
const DEFAULT_OUTLIER_THRESHOLD: f64 = 3.5;

/// Classification of one observed cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellObservation {
    Missing,
    /// Carries the parsed (and possibly unit-normalized) value.
    Numeric(f64),
    Datetime,
    Text,
}

/// Streaming per-column state.
#[derive(Debug)]
pub struct ColumnAccumulator {
    name: String,
    unit: String,
    orig_unit: String,
    non_null: usize,
    missing: usize,
    // Welford state
    count: usize,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
    numeric_hits: usize,
    datetime_hits: usize,
    text_hits: usize,
    categories: HashMap<String, usize>,
    examples: Vec<String>,
}

impl ColumnAccumulator {
    /// Builds an accumulator from a raw header cell, extracting any unit
    /// suffix into the column's unit.
    pub fn new(header: &str) -> Self {
        let (name, unit) = locale::split_units(header.trim());
        ColumnAccumulator {
            name,
            orig_unit: unit.clone(),
            unit,
            non_null: 0,
            missing: 0,
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            numeric_hits: 0,
            datetime_hits: 0,
            text_hits: 0,
            categories: HashMap::new(),
            examples: Vec::new(),
        }
    }

    /// The header name with any unit suffix removed.
    pub fn clean_name(&self) -> &str {
        &self.name
    }

    /// Feeds one trimmed cell. Parse order is numeric → datetime →
    /// text/categorical; a parse miss is never an error, the cell just
    /// falls through to the next kind.
    pub fn observe(&mut self, cell: &str, opts: &Options) -> CellObservation {
        if cell.is_empty() {
            self.missing += 1;
            return CellObservation::Missing;
        }
        self.non_null += 1;

        if cell.contains('%') && self.unit.is_empty() {
            self.unit = "%".to_string();
            if self.orig_unit.is_empty() {
                self.orig_unit = "%".to_string();
            }
        }

        if let Some(parsed) =
            locale::parse_numeric(cell, opts.decimal_separator, opts.thousands_separator)
        {
            let mut x = parsed;
            if opts.unit_normalize && !self.orig_unit.is_empty() {
                if let Some((nx, unit)) =
                    locale::normalize_unit(x, &self.orig_unit, &opts.unit_targets)
                {
                    x = nx;
                    self.unit = unit;
                }
            }
            self.numeric_hits += 1;
            self.count += 1;
            if x < self.min {
                self.min = x;
            }
            if x > self.max {
                self.max = x;
            }
            let delta = x - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (x - self.mean);
            return CellObservation::Numeric(x);
        }

        if locale::is_datetime(cell) {
            self.datetime_hits += 1;
            return CellObservation::Datetime;
        }

        self.text_hits += 1;
        if cell.chars().count() <= CATEGORY_MAX_LEN {
            if let Some(n) = self.categories.get_mut(cell) {
                *n += 1;
            } else if self.categories.len() < CATEGORY_CAP {
                self.categories.insert(cell.to_string(), 1);
            }
        }
        if self.examples.len() < EXAMPLES_KEPT {
            self.examples.push(cell.to_string());
        }
        CellObservation::Text
    }

    /// Snapshots the accumulator into an immutable summary. The column's
    /// kind is the majority of per-type hit counts with numeric winning
    /// ties over datetime over text; a column with only histogram entries
    /// is categorical; one with only examples is text; otherwise unknown.
    ///
    /// `values` is the column's collected numeric stream, used solely for
    /// outlier detection; the caller frees it right after this returns.
    pub fn finalize(self, values: &[f64], opts: &Options) -> ColumnSummary {
        let mut summary = ColumnSummary {
            name: self.name,
            unit: self.unit,
            non_null: self.non_null,
            missing: self.missing,
            ..Default::default()
        };

        if self.numeric_hits >= self.datetime_hits
            && self.numeric_hits >= self.text_hits
            && self.numeric_hits > 0
        {
            summary.kind = ColumnKind::Numeric;
            summary.min = self.min;
            summary.max = self.max;
            summary.mean = self.mean;
            if self.count > 1 {
                summary.std = (self.m2 / (self.count - 1) as f64).sqrt();
            }
            if opts.outliers && values.len() >= OUTLIER_MIN_SAMPLE {
                let threshold = if opts.outlier_threshold > 0.0 {
                    opts.outlier_threshold
                } else {
                    DEFAULT_OUTLIER_THRESHOLD
                };
                summary.outliers = Some(robust_outliers(values, threshold));
            }
        } else if self.datetime_hits >= self.text_hits && self.datetime_hits > 0 {
            summary.kind = ColumnKind::Datetime;
        } else if !self.categories.is_empty() {
            summary.kind = ColumnKind::Categorical;
            summary.unique = self.categories.len();
            let mut tops: Vec<CategoryCount> = self
                .categories
                .into_iter()
                .map(|(value, count)| CategoryCount { value, count })
                .collect();
            tops.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
            tops.truncate(TOP_VALUES_KEPT);
            summary.top_values = tops;
        } else if self.text_hits > 0 {
            summary.kind = ColumnKind::Text;
            summary.example_texts = self.examples;
        }
        summary
    }
}
