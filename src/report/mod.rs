//! Report data model and its deterministic text rendering.
//!
//! A [`Report`] is the terminal artifact of one analysis pass: immutable,
//! serializable, and rendered into a fixed sequence of bracketed sections
//! suitable for embedding in prompts or standalone documents. Rendering is
//! a pure function of the report — identical reports produce byte-identical
//! text.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stats::OutlierStats;

/// Inferred column kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Datetime,
    Categorical,
    Text,
    #[default]
    Unknown,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Datetime => "datetime",
            ColumnKind::Categorical => "categorical",
            ColumnKind::Text => "text",
            ColumnKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One categorical value and its occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub value: String,
    pub count: usize,
}

/// Inferred type and statistics for one column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub kind: ColumnKind,
    pub unit: String,
    pub non_null: usize,
    pub missing: usize,
    /// Distinct categorical values seen (categorical columns only).
    pub unique: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    /// Present only when outlier detection ran for this column.
    pub outliers: Option<OutlierStats>,
    pub top_values: Vec<CategoryCount>,
    pub example_texts: Vec<String>,
}

/// Numeric summary of one column within one group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Aggregated metrics for one group key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupResult {
    pub key: String,
    pub size: usize,
    /// Per-column summaries, ordered by column name.
    pub metrics: std::collections::BTreeMap<String, NumSummary>,
    /// Top correlation pairs by |r|, if per-group correlation was requested.
    pub corr_pairs: Vec<PairCorr>,
}

/// A correlation pair summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairCorr {
    pub a: String,
    pub b: String,
    pub r: f64,
}

/// Symmetric Pearson correlation matrix across numeric columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrMatrix {
    pub columns: Vec<String>,
    /// Row-major, `values[i][j]`; diagonal is exactly 1.
    pub values: Vec<Vec<f64>>,
}

/// Analysis of one tabular dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    /// Base name of the analyzed file.
    pub name: String,
    /// Raw data rows seen in the file.
    pub rows: usize,
    /// Rows actually processed (bounded by the row cap).
    pub processed: usize,
    /// Column summaries in input column order.
    pub cols: Vec<ColumnSummary>,
    /// Up to the configured number of raw sample rows, in input order.
    pub samples: Vec<Vec<String>>,
    pub warnings: Vec<String>,
    /// Group results sorted by descending size, then ascending key.
    pub groups: Vec<GroupResult>,
    /// Global correlation matrix, when requested and ≥2 numeric columns.
    pub corr: Option<CorrMatrix>,
}

const SAMPLE_CELL_MAX: usize = 80;
const GROUP_METRICS_SHOWN: usize = 6;
const GROUP_PAIRS_SHOWN: usize = 8;
const GLOBAL_PAIRS_SHOWN: usize = 10;

impl Report {
    /// Renders the compact fixed-section text form of the report.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("[DATASET SUMMARY]\n");
        if !self.name.is_empty() {
            out.push_str(&format!("File: {}\n", self.name));
        }
        if self.rows > 0 {
            if self.processed > 0 && self.processed < self.rows {
                out.push_str(&format!(
                    "Rows: ~{} (processed {})\n",
                    self.rows, self.processed
                ));
            } else {
                out.push_str(&format!("Rows: {}\n", self.rows));
            }
        }
        out.push_str(&format!("Columns: {}\n\n", self.cols.len()));

        out.push_str("[SCHEMA]\n");
        for c in &self.cols {
            self.render_column(&mut out, c);
        }

        if !self.groups.is_empty() {
            out.push_str("\n[GROUP-BY SUMMARY]\n");
            for g in &self.groups {
                out.push_str(&format!("- {} (n={})\n", g.key, g.size));
                for (name, m) in g.metrics.iter().take(GROUP_METRICS_SHOWN) {
                    out.push_str(&format!(
                        "  • {}: mean {} (min {}, max {})\n",
                        name,
                        sig4(m.mean),
                        sig4(m.min),
                        sig4(m.max)
                    ));
                }
            }
        }

        if self.groups.iter().any(|g| !g.corr_pairs.is_empty()) {
            out.push_str("\n[PER-GROUP CORRELATIONS]\n");
            for g in &self.groups {
                if g.corr_pairs.is_empty() {
                    continue;
                }
                out.push_str(&format!("- {}:\n", g.key));
                for p in g.corr_pairs.iter().take(GROUP_PAIRS_SHOWN) {
                    out.push_str(&format!("  • {} ~ {}: r={:.3}\n", p.a, p.b, p.r));
                }
            }
        }

        if let Some(corr) = &self.corr {
            if corr.columns.len() >= 2 {
                out.push_str("\n[CORRELATIONS]\n");
                for p in top_matrix_pairs(corr).iter().take(GLOBAL_PAIRS_SHOWN) {
                    out.push_str(&format!("- {} ~ {}: r={:.3}\n", p.a, p.b, p.r));
                }
            }
        }

        if !self.samples.is_empty() {
            out.push_str("\n[HEAD AND SAMPLE ROWS]\n");
            self.render_samples(&mut out);
        }

        if !self.warnings.is_empty() {
            out.push_str("\n[NOTES]\n");
            for w in &self.warnings {
                out.push_str(&format!("- {}\n", w));
            }
        }
        out
    }

    fn render_column(&self, out: &mut String, c: &ColumnSummary) {
        let total = c.non_null + c.missing;
        let miss_pct = if total > 0 {
            c.missing as f64 * 100.0 / total as f64
        } else {
            0.0
        };
        let mut name = safe_name(&c.name).to_string();
        if !c.unit.is_empty() {
            name = format!("{} [{}]", name, c.unit);
        }
        out.push_str(&format!(
            "- {}: {} (non-null {}, missing {:.1}%)",
            name, c.kind, c.non_null, miss_pct
        ));
        match c.kind {
            ColumnKind::Numeric => {
                out.push_str(&format!(
                    " — min {}, max {}, mean {}, std {}",
                    sig4(c.min),
                    sig4(c.max),
                    sig4(c.mean),
                    sig4(c.std)
                ));
                if let Some(o) = &c.outliers {
                    out.push_str(&format!(
                        "; outliers: {} above |z|>{:.1}",
                        o.count, o.threshold
                    ));
                    if o.max_abs_z > 0.0 {
                        out.push_str(&format!(" (max |z|≈{:.2})", o.max_abs_z));
                    }
                }
            }
            ColumnKind::Categorical => {
                if !c.top_values.is_empty() {
                    out.push_str(" — top: ");
                    for (i, kv) in c.top_values.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        out.push_str(&format!("{}({})", safe_val(&kv.value), kv.count));
                    }
                    if c.unique > c.top_values.len() {
                        out.push_str(&format!("; unique={}", c.unique));
                    }
                }
            }
            ColumnKind::Text => {
                if !c.example_texts.is_empty() {
                    out.push_str(" — e.g., ");
                    for (i, ex) in c.example_texts.iter().enumerate() {
                        if i > 0 {
                            out.push_str(" | ");
                        }
                        out.push_str(&safe_val(ex));
                    }
                }
            }
            ColumnKind::Datetime | ColumnKind::Unknown => {}
        }
        out.push('\n');
    }

    fn render_samples(&self, out: &mut String) {
        out.push_str("| ");
        for (i, c) in self.cols.iter().enumerate() {
            if i > 0 {
                out.push_str(" | ");
            }
            out.push_str(safe_name(&c.name));
        }
        out.push_str(" |\n| ");
        for i in 0..self.cols.len() {
            if i > 0 {
                out.push_str(" | ");
            }
            out.push_str("---");
        }
        out.push_str(" |\n");
        for row in &self.samples {
            out.push_str("| ");
            for i in 0..self.cols.len() {
                if i > 0 {
                    out.push_str(" | ");
                }
                let val = row.get(i).map_or("", String::as_str);
                let val = if val.chars().count() > SAMPLE_CELL_MAX {
                    let head: String = val.chars().take(SAMPLE_CELL_MAX - 3).collect();
                    format!("{}...", head)
                } else {
                    val.to_string()
                };
                out.push_str(&safe_val(&val));
            }
            out.push_str(" |\n");
        }
    }
}

/// All upper-triangle pairs of the matrix, ranked by descending |r| with
/// ties broken by concatenated names.
fn top_matrix_pairs(corr: &CorrMatrix) -> Vec<PairCorr> {
    let n = corr.columns.len();
    if n < 2 {
        return Vec::new();
    }
    let mut pairs = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in i + 1..n {
            pairs.push(PairCorr {
                a: corr.columns[i].clone(),
                b: corr.columns[j].clone(),
                r: corr.values[i][j],
            });
        }
    }
    crate::stats::correlation::sort_pairs(&mut pairs);
    pairs
}

pub(crate) fn safe_name(s: &str) -> &str {
    let s = s.trim();
    if s.is_empty() {
        "(unnamed)"
    } else {
        s
    }
}

/// Sanitizes a value for single-line, pipe-delimited output.
pub(crate) fn safe_val(s: &str) -> String {
    s.replace('\n', " ").replace('|', "/")
}

/// Formats a number to four significant digits, shortest form: fixed
/// notation within exponent range [-4, 4), scientific outside, trailing
/// zeros trimmed.
pub(crate) fn sig4(x: f64) -> String {
    format_sig(x, 4)
}

fn format_sig(x: f64, digits: usize) -> String {
    if x == 0.0 {
        return "0".to_string();
    }
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    // Round to the requested significant digits via exponent notation,
    // then lay the digits back out in the chosen style.
    let e = format!("{:.*e}", digits - 1, x);
    let (mantissa, exponent) = e.split_once('e').expect("exponent format");
    let exp: i32 = exponent.parse().expect("exponent value");
    let negative = mantissa.starts_with('-');
    let digit_chars: String = mantissa.chars().filter(char::is_ascii_digit).collect();

    let body = if exp < -4 || exp >= digits as i32 {
        let mant = trim_fraction_zeros(&insert_point(&digit_chars, 1));
        format!("{}e{}{:02}", mant, if exp < 0 { '-' } else { '+' }, exp.abs())
    } else {
        trim_fraction_zeros(&insert_point(&digit_chars, 1 + exp))
    };
    if negative {
        format!("-{}", body)
    } else {
        body
    }
}

/// Places the decimal point after `point` digits, padding with zeros as
/// needed. `point` may be non-positive for sub-one magnitudes.
fn insert_point(digits: &str, point: i32) -> String {
    if point <= 0 {
        let mut s = String::from("0.");
        for _ in 0..-point {
            s.push('0');
        }
        s.push_str(digits);
        s
    } else if point as usize >= digits.len() {
        let mut s = digits.to_string();
        for _ in 0..(point as usize - digits.len()) {
            s.push('0');
        }
        s
    } else {
        format!("{}.{}", &digits[..point as usize], &digits[point as usize..])
    }
}

fn trim_fraction_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}
