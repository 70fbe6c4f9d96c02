//! Delimited-text (CSV/TSV) analysis.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use csv::ReaderBuilder;
use log::debug;

use crate::analyzer::{Analyzer, Options};
use crate::error::{Error, Result};
use crate::io::file_name;
use crate::report::Report;

/// Analyzes a delimited-text file and returns a report.
///
/// The delimiter comes from the options; when unset it is sniffed from the
/// first line (see [`sniff_delimiter`]). Records may vary in length; short
/// rows are padded to the header width. A record that cannot be decoded is
/// a fatal error carrying the 1-based data row number.
pub fn analyze_csv<P: AsRef<Path>>(path: P, opts: &Options) -> Result<Report> {
    let path = path.as_ref();
    let delimiter = opts.delimiter.unwrap_or_else(|| sniff_delimiter(path));
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.display().to_string(),
        source,
    })?;

    let reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(u8::try_from(delimiter).unwrap_or(b','))
        .from_reader(file);
    let mut records = reader.into_records();

    let header: Vec<String> = match records.next() {
        Some(Ok(record)) => record.iter().map(str::to_string).collect(),
        Some(Err(source)) => return Err(Error::Header(source)),
        None => return Err(Error::EmptyHeader(file_name(path))),
    };
    if header.is_empty() {
        return Err(Error::EmptyHeader(file_name(path)));
    }

    let mut engine = Analyzer::new(&header, opts);
    for (i, record) in records.enumerate() {
        let record = record.map_err(|source| Error::Row {
            row: i + 1,
            source,
        })?;
        engine.push_row(record.iter().map(str::to_string).collect());
    }
    Ok(engine.finish(&file_name(path)))
}

/// Picks the delimiter by counting candidates (`,`, `;`, tab) on the first
/// line; the most frequent wins, ties favoring the comma. With no
/// candidate on the line at all, falls back to the extension: `.tsv` means
/// tab, anything else comma.
pub fn sniff_delimiter(path: &Path) -> char {
    let mut line = String::new();
    if let Ok(file) = File::open(path) {
        let mut reader = BufReader::new(file);
        if reader.read_line(&mut line).is_ok() {
            let mut best = (',', 0usize);
            for candidate in [',', ';', '\t'] {
                let n = line.matches(candidate).count();
                if n > best.1 {
                    best = (candidate, n);
                }
            }
            if best.1 > 0 {
                debug!("sniffed delimiter {:?} for {}", best.0, path.display());
                return best.0;
            }
        }
    }
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tsv"))
    {
        '\t'
    } else {
        ','
    }
}
