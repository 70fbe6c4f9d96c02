//! Shared fixture data and assertions for the integration tests.
//!
//! The dataset is a small measurement table in a European locale (comma
//! decimals, dot thousands), with units in the headers, one categorical
//! column, one free-text column, and one deliberately extreme row so that
//! outlier detection has something to find.

#![allow(dead_code)]

use tabstat::report::{ColumnSummary, Report};
use tabstat::Options;

pub const CSV_ROWS: [&str; 11] = [
    "Group;Concentration (g/L);Temp (°F);Score;LocaleNumber;Category;Note",
    "A;0,5;70;10,0;1.000,0;alpha;first",
    "A;0,6;71;11,0;1.100,0;alpha;second",
    "A;0,55;69;9,5;0.900,0;beta;third",
    "B;0,7;75;10,5;1.050,0;alpha;fourth",
    "B;0,65;74;9,8;0.980,0;beta;fifth",
    "B;0,68;73;10,2;1.020,0;alpha;sixth",
    "A;0,52;68;8,8;0.880,0;gamma;seventh",
    "B;0,75;76;9,7;0.970,0;beta;eighth",
    "A;3,0;95;50,0;5.000,0;alpha;ninth",
    "B;0,66;72;10,1;1.010,0;gamma;tenth",
];

/// Indices (within the 9 processed rows) belonging to each group.
pub const GROUP_A_ROWS: [usize; 5] = [0, 1, 2, 6, 8];
pub const GROUP_B_ROWS: [usize; 4] = [3, 4, 5, 7];

pub fn mg_per_l(v: f64) -> f64 {
    v * 1000.0
}

pub fn to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

/// The nine processed values per numeric column, after unit normalization.
pub fn processed_concentration() -> Vec<f64> {
    [0.5, 0.6, 0.55, 0.7, 0.65, 0.68, 0.52, 0.75, 3.0]
        .iter()
        .map(|&v| mg_per_l(v))
        .collect()
}

pub fn processed_temp() -> Vec<f64> {
    [70.0, 71.0, 69.0, 75.0, 74.0, 73.0, 68.0, 76.0, 95.0]
        .iter()
        .map(|&v| to_celsius(v))
        .collect()
}

pub fn processed_score() -> Vec<f64> {
    vec![10.0, 11.0, 9.5, 10.5, 9.8, 10.2, 8.8, 9.7, 50.0]
}

pub fn processed_locale() -> Vec<f64> {
    vec![
        1000.0, 1100.0, 900.0, 1050.0, 980.0, 1020.0, 880.0, 970.0, 5000.0,
    ]
}

/// The scenario configuration: nine-row cap, three samples, grouped by
/// `Group`, correlations on (global and per group), outlier detection on,
/// explicit European separators.
pub fn scenario_options() -> Options {
    let mut opts = Options::default();
    opts.sample_rows = 3;
    opts.max_rows = 9;
    opts.group_by = vec!["Group".to_string()];
    opts.correlations = true;
    opts.corr_per_group = true;
    opts.outliers = true;
    opts.decimal_separator = Some(',');
    opts.thousands_separator = Some('.');
    opts
}

pub fn mean(vals: &[f64]) -> f64 {
    vals.iter().sum::<f64>() / vals.len() as f64
}

pub fn sample_std(vals: &[f64]) -> f64 {
    if vals.len() < 2 {
        return 0.0;
    }
    let m = mean(vals);
    let sum: f64 = vals.iter().map(|v| (v - m) * (v - m)).sum();
    (sum / (vals.len() - 1) as f64).sqrt()
}

pub fn min_val(vals: &[f64]) -> f64 {
    vals.iter().copied().fold(f64::INFINITY, f64::min)
}

pub fn max_val(vals: &[f64]) -> f64 {
    vals.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "correlation input length mismatch");
    let (ma, mb) = (mean(a), mean(b));
    let mut num = 0.0;
    let mut da2 = 0.0;
    let mut db2 = 0.0;
    for i in 0..a.len() {
        let da = a[i] - ma;
        let db = b[i] - mb;
        num += da * db;
        da2 += da * da;
        db2 += db * db;
    }
    if da2 == 0.0 || db2 == 0.0 {
        return 0.0;
    }
    num / (da2 * db2).sqrt()
}

/// Reference robust-z computation: median/MAD with linear-interpolation
/// quantiles, max |z| taken over all values.
pub fn robust_outlier_stats(vals: &[f64], threshold: f64) -> (usize, f64) {
    let mut sorted = vals.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let med = quantile(&sorted, 0.5);
    let mut devs: Vec<f64> = sorted.iter().map(|v| (v - med).abs()).collect();
    devs.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mad = quantile(&devs, 0.5);
    if mad == 0.0 {
        return (0, 0.0);
    }
    let mut count = 0;
    let mut max_abs = 0.0_f64;
    for v in vals {
        let z = (0.6745 * (v - med) / mad).abs();
        if z > threshold {
            count += 1;
        }
        if z > max_abs {
            max_abs = z;
        }
    }
    (count, max_abs)
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let w = pos - lo as f64;
    sorted[lo] * (1.0 - w) + sorted[hi] * w
}

pub fn subset(vals: &[f64], idxs: &[usize]) -> Vec<f64> {
    idxs.iter().map(|&i| vals[i]).collect()
}

pub fn almost_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

pub fn column_by_name<'a>(report: &'a Report, name: &str) -> &'a ColumnSummary {
    report
        .cols
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("column {name:?} not found"))
}

pub fn check_stats(col: &ColumnSummary, vals: &[f64]) {
    assert_eq!(col.non_null, vals.len(), "{}: non-null", col.name);
    assert!(almost_eq(col.min, min_val(vals), 1e-6), "{}: min", col.name);
    assert!(almost_eq(col.max, max_val(vals), 1e-6), "{}: max", col.name);
    assert!(almost_eq(col.mean, mean(vals), 1e-6), "{}: mean", col.name);
    assert!(
        almost_eq(col.std, sample_std(vals), 1e-6),
        "{}: std",
        col.name
    );
}

fn check_num_summary(summary: &tabstat::report::NumSummary, vals: &[f64]) {
    assert_eq!(summary.count, vals.len());
    assert!(almost_eq(summary.min, min_val(vals), 1e-6));
    assert!(almost_eq(summary.max, max_val(vals), 1e-6));
    assert!(almost_eq(summary.mean, mean(vals), 1e-6));
}

/// Asserts the full scenario report, shared by the CSV and XLSX paths.
pub fn assert_scenario_report(report: &Report, expected_name: &str) {
    assert_eq!(report.name, expected_name);
    assert_eq!(report.rows, 10);
    assert_eq!(report.processed, 9);
    assert_eq!(
        report.warnings,
        vec!["processed only 9/10 rows due to MaxRows".to_string()]
    );
    assert_eq!(report.samples.len(), 3);
    assert_eq!(
        report.samples[0],
        vec!["A", "0,5", "70", "10,0", "1.000,0", "alpha", "first"]
    );

    // Conservation: per column, non-null + missing == processed.
    for col in &report.cols {
        assert_eq!(
            col.non_null + col.missing,
            report.processed,
            "{}: conservation",
            col.name
        );
    }

    let conc = column_by_name(report, "Concentration");
    assert_eq!(conc.unit, "mg/L");
    check_stats(conc, &processed_concentration());

    let score = column_by_name(report, "Score");
    assert_eq!(score.unit, "");
    check_stats(score, &processed_score());
    let (count, max_z) = robust_outlier_stats(&processed_score(), 3.5);
    let outliers = score.outliers.expect("score outliers");
    assert_eq!(outliers.count, count);
    assert!(almost_eq(outliers.max_abs_z, max_z, 1e-6));
    assert!(almost_eq(outliers.threshold, 3.5, 1e-9));

    let temp = column_by_name(report, "Temp");
    assert_eq!(temp.unit, "°C");
    check_stats(temp, &processed_temp());

    check_stats(column_by_name(report, "LocaleNumber"), &processed_locale());

    let category = column_by_name(report, "Category");
    assert_eq!(category.kind, tabstat::ColumnKind::Categorical);
    assert_eq!(category.top_values[0].value, "alpha");
    assert_eq!(category.top_values[0].count, 5);

    // Groups: A before B (larger), sizes bounded by processed rows.
    assert_eq!(report.groups.len(), 2);
    let group_a = &report.groups[0];
    let group_b = &report.groups[1];
    assert_eq!(group_a.key, "Group=A");
    assert_eq!(group_a.size, 5);
    assert_eq!(group_b.key, "Group=B");
    assert_eq!(group_b.size, 4);
    assert!(group_a.size + group_b.size <= report.processed);

    check_num_summary(
        &group_a.metrics["Score"],
        &subset(&processed_score(), &GROUP_A_ROWS),
    );
    check_num_summary(
        &group_b.metrics["Score"],
        &subset(&processed_score(), &GROUP_B_ROWS),
    );
    check_num_summary(
        &group_a.metrics["Concentration"],
        &subset(&processed_concentration(), &GROUP_A_ROWS),
    );
    check_num_summary(
        &group_b.metrics["Concentration"],
        &subset(&processed_concentration(), &GROUP_B_ROWS),
    );

    // Global correlation matrix: numeric columns in input order,
    // symmetric, unit diagonal.
    let corr = report.corr.as_ref().expect("correlation matrix");
    assert_eq!(
        corr.columns,
        vec!["Concentration", "Temp", "Score", "LocaleNumber"]
    );
    let n = corr.columns.len();
    for i in 0..n {
        assert_eq!(corr.values[i][i], 1.0);
        for j in 0..n {
            assert_eq!(corr.values[i][j], corr.values[j][i]);
            assert!(corr.values[i][j] >= -1.0 && corr.values[i][j] <= 1.0);
        }
    }
    let expected = correlation(&processed_score(), &processed_locale());
    assert!(almost_eq(corr.values[2][3], expected, 1e-6));

    // Per-group top pair: Score ~ LocaleNumber in both groups.
    let corr_a = correlation(
        &subset(&processed_score(), &GROUP_A_ROWS),
        &subset(&processed_locale(), &GROUP_A_ROWS),
    );
    let corr_b = correlation(
        &subset(&processed_score(), &GROUP_B_ROWS),
        &subset(&processed_locale(), &GROUP_B_ROWS),
    );
    let top_a = &group_a.corr_pairs[0];
    assert_eq!((top_a.a.as_str(), top_a.b.as_str()), ("Score", "LocaleNumber"));
    assert!(almost_eq(top_a.r, corr_a, 1e-6));
    let top_b = &group_b.corr_pairs[0];
    assert_eq!((top_b.a.as_str(), top_b.b.as_str()), ("Score", "LocaleNumber"));
    assert!(almost_eq(top_b.r, corr_b, 1e-6));
}
