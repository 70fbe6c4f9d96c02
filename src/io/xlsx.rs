//! OOXML spreadsheet analysis without a spreadsheet library.
//!
//! A workbook is a ZIP archive of XML parts. This module reads the parts
//! it needs directly: `xl/workbook.xml` for the sheet catalog,
//! `xl/_rels/workbook.xml.rels` for relationship-id → part-path mapping,
//! `xl/sharedStrings.xml` for the shared string table, and the resolved
//! worksheet part for row data. Worksheet XML is decoded forward-only by
//! an explicit state machine (`Idle → InRow → InCell → InValue`) so each
//! transition owns its buffers and can be tested in isolation.
//!
//! Relationship targets may be absolute (`/xl/worksheets/sheet1.xml`) or
//! workbook-relative (`worksheets/sheet1.xml`); both must normalize to the
//! same ZIP entry path or every downstream lookup silently fails.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::analyzer::{Analyzer, Options};
use crate::error::{Error, Result};
use crate::io::file_name;
use crate::report::Report;

/// Analyzes one sheet of an `.xlsx` workbook and returns a report.
///
/// `sheet_name` takes precedence when non-empty and is matched
/// case-insensitively against declared sheet names; an unknown name fails
/// with the list of available names. Otherwise `sheet_index` selects the
/// sheet 1-based (0 defaults to the first sheet), first by declared sheet
/// id, then by the conventional `xl/worksheets/sheetN.xml` path.
pub fn analyze_xlsx<P: AsRef<Path>>(
    path: P,
    opts: &Options,
    sheet_name: Option<&str>,
    sheet_index: usize,
) -> Result<Report> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.display().to_string(),
        source,
    })?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| Error::Container(format!("open {}: {}", file_name(path), e)))?;

    let workbook_xml = read_entry(&mut archive, "xl/workbook.xml")?;
    let rels_xml = read_entry(&mut archive, "xl/_rels/workbook.xml.rels")?;
    let shared_xml = read_entry(&mut archive, "xl/sharedStrings.xml")?;

    let sheets = parse_workbook(&workbook_xml)?;
    let rels = parse_relationships(&rels_xml)?;

    let target = resolve_sheet(&sheets, &rels, sheet_name, sheet_index, &file_name(path))?;
    debug!("resolved worksheet path {target}");

    let sheet_xml = read_entry(&mut archive, &target)?;
    if sheet_xml.is_empty() {
        return Err(Error::Container(format!(
            "worksheet part {target} missing from {}",
            file_name(path)
        )));
    }
    let shared = parse_shared_strings(&shared_xml)?;

    let mut rows = SheetRows::new(&sheet_xml, &shared);
    let header = match rows.next_row()? {
        Some(h) if !h.is_empty() => h,
        _ => return Err(Error::EmptyHeader(file_name(path))),
    };

    let mut engine = Analyzer::new(&header, opts);
    while let Some(row) = rows.next_row()? {
        engine.push_row(row);
    }
    Ok(engine.finish(&file_name(path)))
}

/// A sheet entry declared in `xl/workbook.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SheetEntry {
    pub name: String,
    pub sheet_id: usize,
    pub rel_id: String,
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| Error::Container(format!("{name}: {e}")))?;
            Ok(data)
        }
        // Optional parts (shared strings in particular) may be absent.
        Err(ZipError::FileNotFound) => Ok(Vec::new()),
        Err(e) => Err(Error::Container(format!("{name}: {e}"))),
    }
}

fn resolve_sheet(
    sheets: &[SheetEntry],
    rels: &std::collections::HashMap<String, String>,
    sheet_name: Option<&str>,
    sheet_index: usize,
    workbook: &str,
) -> Result<String> {
    if let Some(requested) = sheet_name.filter(|n| !n.is_empty()) {
        let wanted = requested.to_lowercase();
        for sheet in sheets {
            if sheet.name.to_lowercase() == wanted {
                if let Some(rel) = rels.get(&sheet.rel_id) {
                    return Ok(normalize_rel_path(rel));
                }
                break;
            }
        }
        return Err(Error::SheetNotFound {
            name: requested.to_string(),
            workbook: workbook.to_string(),
            available: sheets.iter().map(|s| s.name.clone()).collect(),
        });
    }

    let index = if sheet_index == 0 { 1 } else { sheet_index };
    for sheet in sheets {
        if sheet.sheet_id == index {
            if let Some(rel) = rels.get(&sheet.rel_id) {
                return Ok(normalize_rel_path(rel));
            }
        }
    }
    Ok(format!("xl/worksheets/sheet{index}.xml"))
}

/// Converts a relationship target to its ZIP entry path: strips any
/// leading slash and prepends `xl/` unless already present.
pub(crate) fn normalize_rel_path(rel: &str) -> String {
    let rel = rel.strip_prefix('/').unwrap_or(rel);
    if rel.starts_with("xl/") {
        rel.to_string()
    } else {
        format!("xl/{rel}")
    }
}

fn attr_value(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| Error::Container(e.to_string()))?;
        if attr.key.local_name().as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|e| Error::Container(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Extracts sheet entries (name, numeric sheet id, relationship id) from
/// `xl/workbook.xml`.
pub(crate) fn parse_workbook(data: &[u8]) -> Result<Vec<SheetEntry>> {
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                sheets.push(SheetEntry {
                    name: attr_value(&e, b"name")?.unwrap_or_default(),
                    sheet_id: attr_value(&e, b"sheetId")?
                        .and_then(|v| v.trim().parse().ok())
                        .unwrap_or(0),
                    rel_id: attr_value(&e, b"id")?.unwrap_or_default(),
                });
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(sheets)
}

/// Extracts the relationship-id → target map from
/// `xl/_rels/workbook.xml.rels`.
pub(crate) fn parse_relationships(
    data: &[u8],
) -> Result<std::collections::HashMap<String, String>> {
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();
    let mut out = std::collections::HashMap::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let id = attr_value(&e, b"Id")?.unwrap_or_default();
                let target = attr_value(&e, b"Target")?.unwrap_or_default();
                if !id.is_empty() && !target.is_empty() {
                    out.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Builds the ordered shared-string table: each `<si>` contributes the
/// concatenation of its `<t>` runs.
pub(crate) fn parse_shared_strings(data: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => {
                    out.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Event::Text(t) => {
                if in_text {
                    current.push_str(&t.unescape().map_err(|e| Error::Container(e.to_string()))?);
                }
            }
            Event::CData(t) => {
                if in_text {
                    current.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Decodes the column index from a cell reference like `C12` (0-based, so
/// `C12` → 2) via base-26 letter decoding. `None` when the reference has
/// no letter prefix.
pub(crate) fn column_index(reference: &str) -> Option<usize> {
    let letters: String = reference
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect();
    if letters.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for c in letters.chars() {
        index = index * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(index - 1)
}

/// Parser position within the worksheet XML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SheetState {
    Idle,
    InRow,
    InCell,
    InValue,
}

/// Forward-only worksheet row reader.
///
/// Consumes `<row>`/`<c>`/`<v>` (and inline-string `<t>`) events one at a
/// time; each completed row is padded to the widest column index observed
/// within it. Cells referencing the shared-string table (`t="s"`) are
/// resolved immediately, an out-of-range index yielding the empty string.
pub(crate) struct SheetRows<'a> {
    reader: Reader<&'a [u8]>,
    shared: &'a [String],
    buf: Vec<u8>,
    state: SheetState,
    row: Vec<String>,
    max_col: usize,
    cell_col: usize,
    cell_is_shared: bool,
    value: String,
    text: String,
}

impl<'a> SheetRows<'a> {
    pub fn new(data: &'a [u8], shared: &'a [String]) -> Self {
        SheetRows {
            reader: Reader::from_reader(data),
            shared,
            buf: Vec::new(),
            state: SheetState::Idle,
            row: Vec::new(),
            max_col: 0,
            cell_col: 0,
            cell_is_shared: false,
            value: String::new(),
            text: String::new(),
        }
    }

    /// Returns the next decoded row, or `None` at end of input.
    pub fn next_row(&mut self) -> Result<Option<Vec<String>>> {
        loop {
            self.buf.clear();
            let event = self.reader.read_event_into(&mut self.buf)?.into_owned();
            match event {
                Event::Start(e) => self.on_start(&e)?,
                Event::Empty(e) => {
                    // A self-closing element is an open immediately
                    // followed by a close.
                    self.on_start(&e)?;
                    if let Some(row) = self.on_end(e.local_name().as_ref()) {
                        return Ok(Some(row));
                    }
                }
                Event::Text(t) => {
                    if self.state == SheetState::InValue {
                        self.text
                            .push_str(&t.unescape().map_err(|e| Error::Container(e.to_string()))?);
                    }
                }
                Event::CData(t) => {
                    if self.state == SheetState::InValue {
                        self.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                    }
                }
                Event::End(e) => {
                    if let Some(row) = self.on_end(e.local_name().as_ref()) {
                        return Ok(Some(row));
                    }
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }

    fn on_start(&mut self, e: &BytesStart<'_>) -> Result<()> {
        match (self.state, e.local_name().as_ref()) {
            (SheetState::Idle, b"row") => {
                self.state = SheetState::InRow;
                self.row.clear();
                self.max_col = 0;
            }
            (SheetState::InRow, b"c") => {
                self.state = SheetState::InCell;
                // Cells without a reference attribute fall back to the
                // next free position.
                self.cell_col = attr_value(e, b"r")?
                    .as_deref()
                    .and_then(column_index)
                    .unwrap_or(self.row.len());
                self.cell_is_shared = attr_value(e, b"t")?.as_deref() == Some("s");
                self.value.clear();
                if self.cell_col + 1 > self.max_col {
                    self.max_col = self.cell_col + 1;
                }
            }
            (SheetState::InCell, b"v" | b"t") => {
                self.state = SheetState::InValue;
                self.text.clear();
            }
            _ => {}
        }
        Ok(())
    }

    fn on_end(&mut self, name: &[u8]) -> Option<Vec<String>> {
        match (self.state, name) {
            (SheetState::InValue, b"v" | b"t") => {
                self.value = std::mem::take(&mut self.text);
                self.state = SheetState::InCell;
            }
            (SheetState::InCell, b"c") => {
                let value = if self.cell_is_shared {
                    self.value
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| self.shared.get(i))
                        .cloned()
                        .unwrap_or_default()
                } else {
                    std::mem::take(&mut self.value)
                };
                if self.row.len() <= self.cell_col {
                    self.row.resize(self.cell_col + 1, String::new());
                }
                self.row[self.cell_col] = value;
                self.state = SheetState::InRow;
            }
            (SheetState::InRow, b"row") => {
                self.state = SheetState::Idle;
                let mut row = std::mem::take(&mut self.row);
                if row.len() < self.max_col {
                    row.resize(self.max_col, String::new());
                }
                return Some(row);
            }
            _ => {}
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index_decoding() {
        assert_eq!(column_index("A1"), Some(0));
        assert_eq!(column_index("C12"), Some(2));
        assert_eq!(column_index("Z9"), Some(25));
        assert_eq!(column_index("AA1"), Some(26));
        assert_eq!(column_index("AB20"), Some(27));
        assert_eq!(column_index("c3"), Some(2));
        assert_eq!(column_index("12"), None);
        assert_eq!(column_index(""), None);
    }

    #[test]
    fn test_normalize_rel_path() {
        let cases = [
            ("/xl/worksheets/sheet1.xml", "xl/worksheets/sheet1.xml"),
            ("xl/worksheets/sheet1.xml", "xl/worksheets/sheet1.xml"),
            ("/worksheets/sheet1.xml", "xl/worksheets/sheet1.xml"),
            ("worksheets/sheet1.xml", "xl/worksheets/sheet1.xml"),
            ("styles.xml", "xl/styles.xml"),
            ("/xl/styles.xml", "xl/styles.xml"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_rel_path(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_parse_workbook_sheets() {
        let xml = br#"<?xml version="1.0"?>
            <workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
              <sheets>
                <sheet name="Data" sheetId="2" r:id="rId2"/>
                <sheet name="Summary" sheetId="1" r:id="rId1"/>
              </sheets>
            </workbook>"#;
        let sheets = parse_workbook(xml).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].name, "Data");
        assert_eq!(sheets[0].sheet_id, 2);
        assert_eq!(sheets[0].rel_id, "rId2");
        assert_eq!(sheets[1].name, "Summary");
    }

    #[test]
    fn test_parse_relationships() {
        let xml = br#"<Relationships>
            <Relationship Id="rId1" Type="t" Target="worksheets/sheet1.xml"/>
            <Relationship Id="rId2" Type="t" Target="/xl/worksheets/sheet2.xml"/>
        </Relationships>"#;
        let rels = parse_relationships(xml).unwrap();
        assert_eq!(rels["rId1"], "worksheets/sheet1.xml");
        assert_eq!(rels["rId2"], "/xl/worksheets/sheet2.xml");
    }

    #[test]
    fn test_parse_shared_strings_concatenates_runs() {
        let xml = br#"<sst>
            <si><t>alpha</t></si>
            <si><r><t>be</t></r><r><t>ta</t></r></si>
            <si><t xml:space="preserve"> gamma </t></si>
        </sst>"#;
        let shared = parse_shared_strings(xml).unwrap();
        assert_eq!(shared, vec!["alpha", "beta", " gamma "]);
    }

    #[test]
    fn test_sheet_rows_basic() {
        let shared = vec!["hello".to_string(), "world".to_string()];
        let xml = br#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>42</v></c></row>
            <row r="2"><c r="A2" t="s"><v>1</v></c><c r="C2"><v>7</v></c></row>
        </sheetData></worksheet>"#;
        let mut rows = SheetRows::new(xml, &shared);
        assert_eq!(rows.next_row().unwrap().unwrap(), vec!["hello", "42"]);
        // Gap at B2 padded, row widened to column C.
        assert_eq!(rows.next_row().unwrap().unwrap(), vec!["world", "", "7"]);
        assert!(rows.next_row().unwrap().is_none());
    }

    #[test]
    fn test_sheet_rows_inline_strings_and_empty_cells() {
        let xml = br#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="inlineStr"><is><t>inline</t></is></c><c r="B1"/></row>
        </sheetData></worksheet>"#;
        let mut rows = SheetRows::new(xml, &[]);
        assert_eq!(rows.next_row().unwrap().unwrap(), vec!["inline", ""]);
    }

    #[test]
    fn test_sheet_rows_formula_text_ignored() {
        // Only <v> (and inline <t>) text may reach the cell value.
        let xml = br#"<worksheet><sheetData>
            <row r="1"><c r="A1"><f>SUM(B1:B9)</f><v>45</v></c></row>
        </sheetData></worksheet>"#;
        let mut rows = SheetRows::new(xml, &[]);
        assert_eq!(rows.next_row().unwrap().unwrap(), vec!["45"]);
    }

    #[test]
    fn test_sheet_rows_out_of_range_shared_index() {
        let xml = br#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>99</v></c></row>
        </sheetData></worksheet>"#;
        let mut rows = SheetRows::new(xml, &[]);
        assert_eq!(rows.next_row().unwrap().unwrap(), vec![""]);
    }

    #[test]
    fn test_resolve_sheet_by_name_and_index() {
        let sheets = vec![
            SheetEntry {
                name: "Summary".to_string(),
                sheet_id: 1,
                rel_id: "rId1".to_string(),
            },
            SheetEntry {
                name: "Data".to_string(),
                sheet_id: 2,
                rel_id: "rId2".to_string(),
            },
        ];
        let mut rels = std::collections::HashMap::new();
        rels.insert("rId1".to_string(), "worksheets/sheet1.xml".to_string());
        rels.insert("rId2".to_string(), "/xl/worksheets/sheet2.xml".to_string());

        // Case-insensitive name match, normalized target.
        let target = resolve_sheet(&sheets, &rels, Some("data"), 0, "wb.xlsx").unwrap();
        assert_eq!(target, "xl/worksheets/sheet2.xml");

        // Index resolution against the declared sheet id.
        let target = resolve_sheet(&sheets, &rels, None, 2, "wb.xlsx").unwrap();
        assert_eq!(target, "xl/worksheets/sheet2.xml");

        // Index 0 defaults to the first sheet.
        let target = resolve_sheet(&sheets, &rels, None, 0, "wb.xlsx").unwrap();
        assert_eq!(target, "xl/worksheets/sheet1.xml");

        // Unknown index falls back to the conventional path.
        let target = resolve_sheet(&sheets, &rels, None, 7, "wb.xlsx").unwrap();
        assert_eq!(target, "xl/worksheets/sheet7.xml");
    }

    #[test]
    fn test_resolve_sheet_unknown_name_lists_available() {
        let sheets = vec![SheetEntry {
            name: "Data".to_string(),
            sheet_id: 1,
            rel_id: "rId1".to_string(),
        }];
        let err = resolve_sheet(
            &sheets,
            &std::collections::HashMap::new(),
            Some("Missing"),
            0,
            "wb.xlsx",
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'Missing'"));
        assert!(message.contains("wb.xlsx"));
        assert!(message.contains("Data"));
    }
}
