//! Row sources feeding the analysis engine.
//!
//! - [`delimited`] — CSV/TSV files via the `csv` reader
//! - [`xlsx`] — OOXML spreadsheets, decoded directly from the ZIP container

pub mod delimited;
pub mod xlsx;

pub use delimited::analyze_csv;
pub use xlsx::analyze_xlsx;

use std::path::Path;

/// Base name of a path, for report labeling and error context.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
