//! Per-group aggregation keyed by concatenated `col=value` strings.

use std::collections::HashMap;

use crate::report::{GroupResult, NumSummary};
use crate::stats::PairSet;

/// Groups kept in the report.
const GROUPS_KEPT: usize = 20;
/// Correlation pairs kept per group.
const GROUP_PAIRS_KEPT: usize = 10;

/// Running aggregates for one group key.
#[derive(Debug, Default)]
pub struct GroupAccumulator {
    pub size: usize,
    sum: HashMap<usize, f64>,
    count: HashMap<usize, usize>,
    min: HashMap<usize, f64>,
    max: HashMap<usize, f64>,
}

impl GroupAccumulator {
    /// Records one numeric value for a column within this group.
    pub fn record(&mut self, col: usize, x: f64) {
        *self.sum.entry(col).or_insert(0.0) += x;
        *self.count.entry(col).or_insert(0) += 1;
        let min = self.min.entry(col).or_insert(x);
        if x < *min {
            *min = x;
        }
        let max = self.max.entry(col).or_insert(x);
        if x > *max {
            *max = x;
        }
    }

    fn into_result(
        self,
        key: String,
        numeric_cols: &[usize],
        names: &[String],
        pairs: Option<&PairSet>,
    ) -> GroupResult {
        let mut result = GroupResult {
            key,
            size: self.size,
            ..Default::default()
        };
        for &idx in numeric_cols {
            let count = self.count.get(&idx).copied().unwrap_or(0);
            if count == 0 {
                continue;
            }
            result.metrics.insert(
                names[idx].clone(),
                NumSummary {
                    count,
                    min: self.min[&idx],
                    max: self.max[&idx],
                    mean: self.sum[&idx] / count as f64,
                },
            );
        }
        if let Some(pairs) = pairs {
            result.corr_pairs = pairs.top_pairs(names, GROUP_PAIRS_KEPT);
        }
        result
    }
}

/// Converts the accumulated groups into sorted, capped results: descending
/// size, ties by ascending key, top 20.
pub fn finalize_groups(
    groups: HashMap<String, GroupAccumulator>,
    group_pairs: &HashMap<String, PairSet>,
    numeric_cols: &[usize],
    names: &[String],
) -> Vec<GroupResult> {
    let mut out: Vec<GroupResult> = groups
        .into_iter()
        .map(|(key, acc)| {
            let pairs = group_pairs.get(&key);
            acc.into_result(key, numeric_cols, names, pairs)
        })
        .collect();
    out.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.key.cmp(&b.key)));
    out.truncate(GROUPS_KEPT);
    out
}
