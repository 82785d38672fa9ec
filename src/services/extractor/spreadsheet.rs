//! Workbook extraction: every sheet rendered as CSV under a `Sheet: <name>` header.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::Arc;
use zip::ZipArchive;

use super::xml::{attribute, read_entry};
use super::{run_blocking, ExtractionStrategy};
use crate::error::ConversionError;

const STRATEGY: &str = "spreadsheet";

/// Sheets in workbook order, each already rendered as CSV.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<(String, String)>,
}

pub trait WorkbookReader: Send + Sync + 'static {
    fn read_workbook(&self, path: &Path) -> Result<Workbook, ConversionError>;
}

pub fn render_workbook(workbook: &Workbook) -> String {
    let mut text = String::new();
    for (name, csv) in &workbook.sheets {
        text.push_str(&format!("Sheet: {}\n{}\n\n", name, csv));
    }
    text.trim().to_string()
}

pub struct SpreadsheetStrategy<R> {
    reader: Arc<R>,
}

impl<R: WorkbookReader> SpreadsheetStrategy<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Arc::new(reader),
        }
    }
}

#[async_trait]
impl<R: WorkbookReader> ExtractionStrategy for SpreadsheetStrategy<R> {
    fn name(&self) -> &'static str {
        STRATEGY
    }

    async fn extract(&self, path: &Path) -> Result<String, ConversionError> {
        let reader = self.reader.clone();
        let path = path.to_path_buf();
        run_blocking(STRATEGY, move || {
            let workbook = reader.read_workbook(&path)?;
            Ok(render_workbook(&workbook))
        })
        .await
    }
}

/// SpreadsheetML (`.xlsx`) reader. Legacy BIFF `.xls` files are not zip
/// archives and fail here.
pub struct XlsxReader;

impl WorkbookReader for XlsxReader {
    fn read_workbook(&self, path: &Path) -> Result<Workbook, ConversionError> {
        let file = File::open(path)
            .map_err(|e| ConversionError::new(STRATEGY, format!("failed to open {}: {}", path.display(), e)))?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| ConversionError::new(STRATEGY, format!("not an XLSX archive: {}", e)))?;
        read_xlsx_archive(&mut archive, STRATEGY)
    }
}

pub(crate) fn read_xlsx_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    strategy: &'static str,
) -> Result<Workbook, ConversionError> {
    let xml_error = |part: &str, e: quick_xml::Error| {
        ConversionError::new(strategy, format!("invalid {}: {}", part, e))
    };

    let workbook_xml = read_entry(archive, "xl/workbook.xml", strategy)?;
    let sheets = parse_sheet_list(&workbook_xml).map_err(|e| xml_error("workbook.xml", e))?;

    let rels_xml = read_entry(archive, "xl/_rels/workbook.xml.rels", strategy)?;
    let targets = parse_relationships(&rels_xml).map_err(|e| xml_error("workbook.xml.rels", e))?;

    let shared = match read_entry(archive, "xl/sharedStrings.xml", strategy) {
        Ok(xml) => parse_shared_strings(&xml).map_err(|e| xml_error("sharedStrings.xml", e))?,
        Err(_) => Vec::new(),
    };

    let mut workbook = Workbook::default();
    for (name, rel_id) in sheets {
        let target = targets.get(&rel_id).ok_or_else(|| {
            ConversionError::new(strategy, format!("sheet {} has no relationship {}", name, rel_id))
        })?;
        let part = resolve_target(target);
        let sheet_xml = read_entry(archive, &part, strategy)?;
        let rows = parse_sheet_rows(&sheet_xml, &shared).map_err(|e| xml_error(part.as_str(), e))?;
        workbook.sheets.push((name, rows_to_csv(&rows)));
    }

    Ok(workbook)
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

/// `(sheet name, relationship id)` in workbook order.
fn parse_sheet_list(xml: &str) -> Result<Vec<(String, String)>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut sheets = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                if let (Some(name), Some(id)) = (attribute(&e, b"name"), attribute(&e, b"id")) {
                    sheets.push((name, id));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(sheets)
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut targets = HashMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attribute(&e, b"Id"), attribute(&e, b"Target")) {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(targets)
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // Phonetic runs repeat the reading of the string; skip them.
    let mut in_phonetic = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(e) if in_text && !in_phonetic => current.push_str(&e.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

#[derive(Default)]
struct CellState {
    column: Option<usize>,
    kind: Option<String>,
    value: String,
    inline: String,
}

/// Rows keyed by 1-based row number, cells keyed by 0-based column.
fn parse_sheet_rows(
    xml: &str,
    shared: &[String],
) -> Result<BTreeMap<usize, BTreeMap<usize, String>>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut rows: BTreeMap<usize, BTreeMap<usize, String>> = BTreeMap::new();
    let mut row_number = 0usize;
    let mut next_column = 0usize;
    let mut cell: Option<CellState> = None;
    let mut in_value = false;
    let mut in_inline_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    row_number = attribute(&e, b"r")
                        .and_then(|r| row_index(&r))
                        .unwrap_or(row_number + 1);
                    next_column = 0;
                }
                b"c" => {
                    cell = Some(CellState {
                        column: attribute(&e, b"r").and_then(|r| column_index(&r)),
                        kind: attribute(&e, b"t"),
                        ..CellState::default()
                    });
                }
                b"v" => in_value = true,
                b"t" if cell.is_some() => in_inline_text = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                row_number = attribute(&e, b"r")
                    .and_then(|r| row_index(&r))
                    .unwrap_or(row_number + 1);
                rows.entry(row_number).or_default();
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                next_column = attribute(&e, b"r")
                    .and_then(|r| column_index(&r))
                    .unwrap_or(next_column)
                    + 1;
            }
            Event::Text(e) => {
                if let Some(state) = cell.as_mut() {
                    if in_value {
                        state.value.push_str(&e.unescape()?);
                    } else if in_inline_text {
                        state.inline.push_str(&e.unescape()?);
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                b"c" => {
                    if let Some(state) = cell.take() {
                        let column = state.column.unwrap_or(next_column);
                        next_column = column + 1;
                        let value = cell_value(&state, shared);
                        if !value.is_empty() {
                            rows.entry(row_number).or_default().insert(column, value);
                        }
                    }
                }
                b"row" => {
                    rows.entry(row_number).or_default();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rows)
}

fn cell_value(state: &CellState, shared: &[String]) -> String {
    match state.kind.as_deref() {
        Some("s") => state
            .value
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|idx| shared.get(idx).cloned())
            .unwrap_or_default(),
        Some("b") => match state.value.trim() {
            "1" => "TRUE".to_string(),
            _ => "FALSE".to_string(),
        },
        Some("inlineStr") => state.inline.clone(),
        _ => state.value.clone(),
    }
}

/// Column count of the widest sheet Excel can write (`XFD`).
const MAX_COLUMNS: usize = 16_384;
/// Row count of the tallest sheet Excel can write.
const MAX_ROWS: usize = 1_048_576;

/// `"AB12"` -> 27. References past `XFD` are rejected.
fn column_index(reference: &str) -> Option<usize> {
    let letters: String = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for c in letters.chars() {
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
        if index > MAX_COLUMNS {
            return None;
        }
    }
    Some(index - 1)
}

fn row_index(reference: &str) -> Option<usize> {
    reference
        .parse::<usize>()
        .ok()
        .filter(|row| (1..=MAX_ROWS).contains(row))
}

/// Renders the used range: blank rows between data rows are kept, every row
/// spans the same columns.
fn rows_to_csv(rows: &BTreeMap<usize, BTreeMap<usize, String>>) -> String {
    let populated: Vec<_> = rows.iter().filter(|(_, cells)| !cells.is_empty()).collect();
    let (Some(first), Some(last)) = (populated.first(), populated.last()) else {
        return String::new();
    };
    let (first_row, last_row) = (*first.0, *last.0);

    let first_col = populated
        .iter()
        .filter_map(|(_, cells)| cells.keys().next())
        .min()
        .copied()
        .unwrap_or(0);
    let last_col = populated
        .iter()
        .filter_map(|(_, cells)| cells.keys().next_back())
        .max()
        .copied()
        .unwrap_or(0);

    let empty = BTreeMap::new();
    (first_row..=last_row)
        .map(|r| {
            let cells = rows.get(&r).unwrap_or(&empty);
            (first_col..=last_col)
                .map(|c| cells.get(&c).map(|v| csv_field(v)).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
