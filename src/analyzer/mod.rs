//! The single-pass analysis engine.
//!
//! A row source (delimited text or spreadsheet) yields a header and
//! successive rows; [`Analyzer`] distributes each row to the per-column
//! accumulators and, when enabled, to the correlation and group-by
//! accumulators. After the source is exhausted, [`Analyzer::finish`]
//! snapshots everything into an immutable [`Report`]. Each analysis builds
//! fresh state — nothing is shared across invocations.

use std::collections::{BTreeMap, HashMap};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::column::{CellObservation, ColumnAccumulator};
use crate::groupby::{self, GroupAccumulator};
use crate::report::{safe_val, ColumnKind, Report};
use crate::stats::PairSet;

const DEFAULT_MAX_ROWS: usize = 100_000;
const DEFAULT_SAMPLE_ROWS: usize = 5;

/// Analysis configuration. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    /// Limits rows processed; 0 means unlimited.
    pub max_rows: usize,
    /// Example rows to include in the report; 0 falls back to 5.
    pub sample_rows: usize,
    /// Delimiter for delimited text. `None` auto-detects among ',', ';'
    /// and tab.
    pub delimiter: Option<char>,
    /// Computes per-group summaries for the given column names.
    pub group_by: Vec<String>,
    /// Computes Pearson correlations among numeric columns.
    pub correlations: bool,
    /// Computes correlations per group key.
    pub corr_per_group: bool,
    /// Numeric parsing locale. `None` auto-detects per value.
    pub decimal_separator: Option<char>,
    pub thousands_separator: Option<char>,
    /// Counts robust-z outliers per numeric column when set.
    pub outliers: bool,
    /// Robust z threshold; a non-positive value falls back to 3.5.
    pub outlier_threshold: f64,
    /// Converts values to target units using the simple mappings below.
    pub unit_normalize: bool,
    /// from-unit → to-unit, e.g. {"g/L": "mg/L", "°F": "°C"}.
    pub unit_targets: HashMap<String, String>,
}

impl Default for Options {
    /// Reasonable defaults for dataset analysis.
    fn default() -> Self {
        let mut unit_targets = HashMap::new();
        unit_targets.insert("g/L".to_string(), "mg/L".to_string());
        unit_targets.insert("ug/L".to_string(), "mg/L".to_string());
        unit_targets.insert("°F".to_string(), "°C".to_string());
        Options {
            max_rows: DEFAULT_MAX_ROWS,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            delimiter: None,
            group_by: Vec::new(),
            correlations: false,
            corr_per_group: false,
            decimal_separator: None,
            thousands_separator: None,
            outliers: false,
            outlier_threshold: 0.0,
            unit_normalize: true,
            unit_targets,
        }
    }
}

/// Accumulating state for one analysis pass.
pub struct Analyzer<'a> {
    opts: &'a Options,
    cols: Vec<ColumnAccumulator>,
    /// Lowercased clean column name → index, for group-by lookup.
    group_lookup: HashMap<String, usize>,
    rows: usize,
    processed: usize,
    samples: Vec<Vec<String>>,
    /// Per-column numeric streams, materialized for outlier detection and
    /// released column-by-column during finalization.
    values: Vec<Vec<f64>>,
    pairs: PairSet,
    groups: HashMap<String, GroupAccumulator>,
    group_pairs: HashMap<String, PairSet>,
    max_rows: usize,
    sample_rows: usize,
}

impl<'a> Analyzer<'a> {
    /// Builds fresh accumulators for the given header row.
    pub fn new(header: &[String], opts: &'a Options) -> Self {
        let cols: Vec<ColumnAccumulator> = header
            .iter()
            .map(|h| ColumnAccumulator::new(h))
            .collect();
        let mut group_lookup = HashMap::new();
        for (i, col) in cols.iter().enumerate() {
            group_lookup.insert(col.clean_name().to_lowercase(), i);
        }
        let ncol = cols.len();
        Analyzer {
            opts,
            cols,
            group_lookup,
            rows: 0,
            processed: 0,
            samples: Vec::new(),
            values: vec![Vec::new(); ncol],
            pairs: PairSet::default(),
            groups: HashMap::new(),
            group_pairs: HashMap::new(),
            max_rows: if opts.max_rows == 0 {
                usize::MAX
            } else {
                opts.max_rows
            },
            sample_rows: if opts.sample_rows == 0 {
                DEFAULT_SAMPLE_ROWS
            } else {
                opts.sample_rows
            },
        }
    }

    /// Feeds one data row. Rows past the cap still count toward the raw
    /// row total but are otherwise ignored.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        let ncol = self.cols.len();
        self.rows += 1;
        row.resize(ncol, String::new());
        if self.processed >= self.max_rows {
            return;
        }
        self.processed += 1;

        if self.samples.len() < self.sample_rows {
            self.samples.push(row.clone());
        }

        let group_key = self.group_key(&row);
        let want_pairs = self.opts.correlations || self.opts.corr_per_group;
        let mut row_values: BTreeMap<usize, f64> = BTreeMap::new();

        for (j, cell) in row.iter().enumerate() {
            let observation = self.cols[j].observe(cell.trim(), self.opts);
            if let CellObservation::Numeric(x) = observation {
                self.values[j].push(x);
                if want_pairs {
                    row_values.insert(j, x);
                }
                if let Some(key) = &group_key {
                    self.groups.entry(key.clone()).or_default().record(j, x);
                }
            }
        }

        if let Some(key) = group_key {
            self.groups.entry(key.clone()).or_default().size += 1;
            if self.opts.corr_per_group && row_values.len() >= 2 {
                self.group_pairs
                    .entry(key)
                    .or_default()
                    .observe_row(&row_values);
            }
        }
        if self.opts.correlations && row_values.len() >= 2 {
            self.pairs.observe_row(&row_values);
        }
    }

    /// Builds this row's group key, or `None` when no requested column
    /// exists in the header.
    fn group_key(&self, row: &[String]) -> Option<String> {
        if self.opts.group_by.is_empty() {
            return None;
        }
        let mut parts = Vec::new();
        for requested in &self.opts.group_by {
            let Some(&idx) = self.group_lookup.get(&requested.trim().to_lowercase()) else {
                continue;
            };
            parts.push(format!(
                "{}={}",
                self.cols[idx].clean_name(),
                safe_val(row[idx].trim())
            ));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" | "))
        }
    }

    /// Finalizes all accumulators into an immutable report.
    pub fn finish(self, name: &str) -> Report {
        let Analyzer {
            opts,
            cols,
            rows,
            processed,
            samples,
            mut values,
            pairs,
            groups,
            group_pairs,
            ..
        } = self;

        let names: Vec<String> = cols.iter().map(|c| c.clean_name().to_string()).collect();
        let mut summaries = Vec::with_capacity(cols.len());
        let mut numeric_cols = Vec::new();
        for (idx, col) in cols.into_iter().enumerate() {
            // Take the buffer so it is dropped as soon as the column is
            // finalized, regardless of which row source produced it.
            let buffer = std::mem::take(&mut values[idx]);
            let summary = col.finalize(&buffer, opts);
            if summary.kind == ColumnKind::Numeric {
                numeric_cols.push(idx);
            }
            summaries.push(summary);
        }

        let mut warnings = Vec::new();
        if processed < rows {
            let message = format!("processed only {processed}/{rows} rows due to MaxRows");
            warn!("{name}: {message}");
            warnings.push(message);
        }

        let group_results = groupby::finalize_groups(groups, &group_pairs, &numeric_cols, &names);

        let corr = (opts.correlations && numeric_cols.len() >= 2)
            .then(|| pairs.matrix(&numeric_cols, &names));

        Report {
            name: name.to_string(),
            rows,
            processed,
            cols: summaries,
            samples,
            warnings,
            groups: group_results,
            corr,
        }
    }
}
