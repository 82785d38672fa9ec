//! Universal fallback extractor.
//!
//! The declared media type is not trusted here: the format is sniffed from
//! the file content, and the matching reader runs with line breaks preserved.

use async_trait::async_trait;
use std::io::Cursor;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};
use zip::ZipArchive;

use super::spreadsheet::{read_xlsx_archive, render_workbook};
use super::text_decode::{decode_text, looks_binary};
use super::word::convert_docx_archive;
use super::xml::{extract_xml_text, read_entry, DRAWING, OPEN_DOCUMENT};
use super::{read_file, run_blocking, ExtractionStrategy};
use crate::error::ConversionError;

const STRATEGY: &str = "generic";

const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sniffed {
    Pdf,
    Zip,
    Ole2,
    Rtf,
    Text,
    Binary,
}

fn sniff(bytes: &[u8]) -> Sniffed {
    let head = &bytes[..bytes.len().min(1024)];
    if head.windows(5).any(|w| w == b"%PDF-") {
        Sniffed::Pdf
    } else if bytes.starts_with(b"PK\x03\x04") {
        Sniffed::Zip
    } else if bytes.starts_with(OLE2_MAGIC) {
        Sniffed::Ole2
    } else if bytes.starts_with(b"{\\rtf") {
        Sniffed::Rtf
    } else if looks_binary(bytes) {
        Sniffed::Binary
    } else {
        Sniffed::Text
    }
}

/// Converter command tried for a legacy binary Office file.
#[derive(Debug, Clone)]
pub struct ExternalConverter {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalConverter {
    fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

pub struct GenericStrategy {
    converters: Vec<ExternalConverter>,
}

impl GenericStrategy {
    pub fn new() -> Self {
        Self {
            converters: vec![
                ExternalConverter::new("antiword", &["-w", "0"]),
                ExternalConverter::new("catppt", &[]),
                ExternalConverter::new("xls2csv", &[]),
            ],
        }
    }

    pub fn with_converters(converters: Vec<ExternalConverter>) -> Self {
        Self { converters }
    }

    pub fn is_converter_available(program: &str) -> bool {
        std::process::Command::new("which")
            .arg(program)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    async fn extract_ole2(&self, path: &Path) -> Result<String, ConversionError> {
        let mut failures = Vec::new();

        for converter in self.converters_for(path) {
            let output = Command::new(&converter.program)
                .args(&converter.args)
                .arg(path)
                .kill_on_drop(true)
                .output()
                .await;

            match output {
                Ok(output) if output.status.success() => {
                    let text = decode_text(&output.stdout).trim().to_string();
                    if !text.is_empty() {
                        info!(converter = %converter.program, "External converter succeeded");
                        return Ok(text);
                    }
                    failures.push(format!("{}: no output", converter.program));
                }
                Ok(output) => failures.push(format!(
                    "{}: exited with {}",
                    converter.program, output.status
                )),
                Err(e) => failures.push(format!("{}: {}", converter.program, e)),
            }
        }

        Err(ConversionError::new(
            STRATEGY,
            format!("no converter handled legacy document ({})", failures.join("; ")),
        ))
    }

    /// Converters whose name suggests the file's extension come first.
    fn converters_for(&self, path: &Path) -> Vec<&ExternalConverter> {
        let preferred = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("doc") => Some("antiword"),
            Some("ppt") => Some("catppt"),
            Some("xls") => Some("xls2csv"),
            _ => None,
        };

        let mut ordered: Vec<&ExternalConverter> = self.converters.iter().collect();
        if let Some(preferred) = preferred {
            ordered.sort_by_key(|c| c.program != preferred);
        }
        ordered
    }
}

impl Default for GenericStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionStrategy for GenericStrategy {
    fn name(&self) -> &'static str {
        STRATEGY
    }

    async fn extract(&self, path: &Path) -> Result<String, ConversionError> {
        let bytes = read_file(STRATEGY, path).await?;
        let kind = sniff(&bytes);
        debug!(path = %path.display(), kind = ?kind, "Sniffed document format");

        match kind {
            Sniffed::Pdf => {
                run_blocking(STRATEGY, move || {
                    pdf_extract::extract_text_from_mem(&bytes)
                        .map(|text| text.trim().to_string())
                        .map_err(|e| ConversionError::new(STRATEGY, format!("PDF text extraction failed: {}", e)))
                })
                .await
            }
            Sniffed::Zip => run_blocking(STRATEGY, move || extract_zip(bytes)).await,
            Sniffed::Ole2 => self.extract_ole2(path).await,
            Sniffed::Rtf => Ok(strip_rtf(&decode_text(&bytes))),
            Sniffed::Text => Ok(decode_text(&bytes).trim().to_string()),
            Sniffed::Binary => Err(ConversionError::new(
                STRATEGY,
                "unrecognised binary format",
            )),
        }
    }
}

fn extract_zip(bytes: Vec<u8>) -> Result<String, ConversionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ConversionError::new(STRATEGY, format!("invalid zip archive: {}", e)))?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let has = |name: &str| names.iter().any(|n| n == name);

    if has("word/document.xml") {
        return convert_docx_archive(&mut archive, STRATEGY);
    }
    if has("xl/workbook.xml") {
        return read_xlsx_archive(&mut archive, STRATEGY).map(|wb| render_workbook(&wb));
    }

    let mut slides: Vec<(usize, &String)> = names
        .iter()
        .filter_map(|n| {
            n.strip_prefix("ppt/slides/slide")
                .and_then(|rest| rest.strip_suffix(".xml"))
                .and_then(|num| num.parse().ok())
                .map(|num| (num, n))
        })
        .collect();
    if !slides.is_empty() {
        slides.sort();
        let mut parts = Vec::new();
        for (_, name) in slides {
            let xml = read_entry(&mut archive, name, STRATEGY)?;
            let text = extract_xml_text(&xml, &DRAWING)
                .map_err(|e| ConversionError::new(STRATEGY, format!("invalid {}: {}", name, e)))?;
            if !text.is_empty() {
                parts.push(text);
            }
        }
        return Ok(parts.join("\n\n"));
    }

    if has("content.xml") {
        let xml = read_entry(&mut archive, "content.xml", STRATEGY)?;
        let text = extract_xml_text(&xml, &OPEN_DOCUMENT)
            .map_err(|e| ConversionError::new(STRATEGY, format!("invalid content.xml: {}", e)))?;
        return Ok(tidy_lines(&text));
    }

    Err(ConversionError::new(STRATEGY, "archive is not a recognised office document"))
}

/// Trims each line and collapses runs of blank lines to one.
fn tidy_lines(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    out.join("\n").trim().to_string()
}

/// RTF destinations whose content is never body text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl", "colortbl", "stylesheet", "info", "pict", "header", "footer", "listtable",
    "listoverridetable", "rsidtbl", "generator", "themedata", "datastore",
];

fn strip_rtf(rtf: &str) -> String {
    let chars: Vec<char> = rtf.chars().collect();
    let mut out = String::new();
    // One entry per open group: whether its content is skipped.
    let mut skip_stack: Vec<bool> = Vec::new();
    let mut skipping = false;
    let mut pending_skip = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '{' => {
                skip_stack.push(skipping);
                i += 1;
            }
            '}' => {
                skipping = skip_stack.pop().unwrap_or(false);
                i += 1;
            }
            '\\' => {
                let Some(&next) = chars.get(i + 1) else {
                    break;
                };
                if next == '*' {
                    skipping = true;
                    i += 2;
                } else if matches!(next, '\\' | '{' | '}') {
                    if !skipping {
                        out.push(next);
                    }
                    i += 2;
                } else if next == '\'' {
                    let hex: String = chars.iter().skip(i + 2).take(2).collect();
                    if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                        if !skipping && pending_skip == 0 {
                            out.push(byte as char);
                        }
                    }
                    pending_skip = pending_skip.saturating_sub(1);
                    i += 4;
                } else if next.is_ascii_alphabetic() {
                    let mut j = i + 1;
                    while j < chars.len() && chars[j].is_ascii_alphabetic() {
                        j += 1;
                    }
                    let word: String = chars[i + 1..j].iter().collect();
                    let mut k = j;
                    if k < chars.len() && (chars[k] == '-' || chars[k].is_ascii_digit()) {
                        k += 1;
                        while k < chars.len() && chars[k].is_ascii_digit() {
                            k += 1;
                        }
                    }
                    let param: Option<i32> = chars[j..k].iter().collect::<String>().parse().ok();
                    // A single space delimits the control word.
                    if k < chars.len() && chars[k] == ' ' {
                        k += 1;
                    }
                    i = k;

                    if SKIPPED_DESTINATIONS.contains(&word.as_str()) {
                        skipping = true;
                        continue;
                    }
                    if skipping {
                        continue;
                    }
                    match word.as_str() {
                        "par" | "line" | "sect" | "page" | "row" => out.push('\n'),
                        "tab" | "cell" => out.push('\t'),
                        "u" => {
                            if let Some(code) = param {
                                let code = if code < 0 { code + 65536 } else { code };
                                if let Some(ch) = char::from_u32(code as u32) {
                                    out.push(ch);
                                }
                                // \uN is followed by a one-character ANSI fallback.
                                pending_skip = 1;
                            }
                        }
                        _ => {}
                    }
                } else {
                    // Control symbols such as \~ or \-.
                    if next == '~' && !skipping {
                        out.push(' ');
                    }
                    i += 2;
                }
            }
            '\r' | '\n' => i += 1,
            _ => {
                if !skipping {
                    if pending_skip > 0 {
                        pending_skip -= 1;
                    } else {
                        out.push(c);
                    }
                }
                i += 1;
            }
        }
    }

    tidy_lines(&out)
}
