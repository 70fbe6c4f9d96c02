//! Locale-aware numeric parsing and unit handling for raw cell values.
//!
//! Everything in this module is a pure function of its inputs so that the
//! separator heuristics have a single documented interpretation: with no
//! explicit configuration, `"1.234"` parses as one-point-two-three-four
//! (the dot is the decimal separator unless a comma gives evidence
//! otherwise), and when both separators appear the rightmost one wins.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;

/// Parses a raw cell value as a floating-point number.
///
/// Percent signs are stripped, non-breaking spaces normalized, and the
/// decimal/thousands separators resolved before handing the cleaned string
/// to the standard float parser (scientific notation passes through).
///
/// Separator resolution when `decimal` is `None`: if both `.` and `,`
/// appear, the rightmost occurrence is the decimal separator and the other
/// the thousands separator; a lone `,` is treated as the decimal; the
/// default is `.`. With no explicit thousands separator every candidate
/// (`,`, `.`, space) that differs from the decimal is stripped.
pub fn parse_numeric(value: &str, decimal: Option<char>, thousands: Option<char>) -> Option<f64> {
    let mut raw = value.trim().to_string();
    if raw.contains('%') {
        raw = raw.replace('%', "");
    }
    raw = raw.replace('\u{00A0}', " ");
    let mut raw = raw.trim().to_string();

    let mut dec = decimal;
    let mut thou = thousands;
    if dec.is_none() {
        let cpos = raw.rfind(',');
        let dpos = raw.rfind('.');
        match (cpos, dpos) {
            (Some(c), Some(d)) => {
                if c > d {
                    dec = Some(',');
                    thou = Some('.');
                } else {
                    dec = Some('.');
                    thou = Some(',');
                }
            }
            (Some(_), None) => dec = Some(','),
            _ => dec = Some('.'),
        }
    }
    let dec = dec.unwrap_or('.');

    match thou {
        None => {
            for sep in [',', '.', ' '] {
                if sep != dec {
                    raw = raw.replace(sep, "");
                }
            }
        }
        Some(t) if t != dec => {
            raw = raw.replace(t, "");
        }
        Some(_) => {}
    }
    if dec != '.' {
        raw = raw.replace(dec, ".");
    }

    raw.parse::<f64>().ok()
}

lazy_static! {
    // Column headers carry units in three recognized shapes, e.g.
    // "Alpha (%)", "Mass [mg/L]", "Temp_°C".
    static ref PAREN_UNIT: Regex = Regex::new(r"^(.*)\s*\(([^)]+)\)\s*$").unwrap();
    static ref BRACKET_UNIT: Regex = Regex::new(r"^(.*)\s*\[([^\]]+)\]\s*$").unwrap();
    static ref SUFFIX_UNIT: Regex =
        Regex::new(r"^(.*?)[_\s-]+(mg/L|g/L|ug/L|°[CF]|Brix|%|ppm|ppb)$").unwrap();
}

/// Splits a column header into a clean name and a unit string.
///
/// Patterns are tried in priority order — trailing `(unit)`, trailing
/// `[unit]`, then a trailing token from a fixed unit vocabulary separated
/// by space, underscore, or hyphen. The first pattern yielding both a
/// non-empty name and unit wins; otherwise the unit is empty.
pub fn split_units(header: &str) -> (String, String) {
    let s = header.trim();
    for re in [&*PAREN_UNIT, &*BRACKET_UNIT, &*SUFFIX_UNIT] {
        if let Some(caps) = re.captures(s) {
            let base = caps.get(1).map_or("", |m| m.as_str()).trim();
            let unit = caps.get(2).map_or("", |m| m.as_str()).trim();
            if !base.is_empty() && !unit.is_empty() {
                return (base.to_string(), unit.to_string());
            }
        }
    }
    (s.to_string(), String::new())
}

/// Converts a value from its unit to the configured target unit.
///
/// Only the known conversions are applied; a mapping between unsupported
/// units is ignored. Returns the converted value and the target unit.
pub fn normalize_unit(
    x: f64,
    unit: &str,
    targets: &HashMap<String, String>,
) -> Option<(f64, String)> {
    let target = targets.get(unit)?;
    match (unit, target.as_str()) {
        ("g/L", "mg/L") => Some((x * 1000.0, target.clone())),
        ("ug/L", "mg/L") => Some((x / 1000.0, target.clone())),
        ("°F", "°C") => Some(((x - 32.0) * 5.0 / 9.0, target.clone())),
        _ => None,
    }
}

const DATE_LAYOUTS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y"];
const DATETIME_LAYOUTS: [&str; 4] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// Reports whether the value parses as a datetime under the fixed layout
/// list (RFC3339 first, then common date and datetime patterns). First
/// match wins.
pub fn is_datetime(value: &str) -> bool {
    if DateTime::parse_from_rfc3339(value).is_ok() {
        return true;
    }
    DATE_LAYOUTS
        .iter()
        .any(|layout| NaiveDate::parse_from_str(value, layout).is_ok())
        || DATETIME_LAYOUTS
            .iter()
            .any(|layout| NaiveDateTime::parse_from_str(value, layout).is_ok())
}
