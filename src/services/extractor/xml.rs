//! Text extraction from the XML parts of zipped office documents.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Read, Seek};
use zip::ZipArchive;

use crate::error::ConversionError;

/// Describes where text lives in one XML dialect.
pub struct TextLayout {
    /// Elements whose text content is kept. Empty means all text is kept.
    pub text_elements: &'static [&'static [u8]],
    /// Elements that end a paragraph.
    pub block_elements: &'static [&'static [u8]],
    pub block_separator: &'static str,
    /// Elements inside which line breaks and tabs are part of the text.
    pub inline_elements: &'static [&'static [u8]],
    pub line_break_elements: &'static [&'static [u8]],
    pub tab_elements: &'static [&'static [u8]],
    /// Whether `<s c="N"/>` encodes a run of spaces.
    pub collapsed_spaces: bool,
}

/// WordprocessingML body text.
pub const WORDPROCESSING: TextLayout = TextLayout {
    text_elements: &[b"t"],
    block_elements: &[b"p"],
    block_separator: "\n\n",
    inline_elements: &[b"r"],
    line_break_elements: &[b"br", b"cr"],
    tab_elements: &[b"tab"],
    collapsed_spaces: false,
};

/// DrawingML text, as used by presentation slides.
pub const DRAWING: TextLayout = TextLayout {
    text_elements: &[b"t"],
    block_elements: &[b"p"],
    block_separator: "\n",
    inline_elements: &[b"p"],
    // Tabs in slides are literal characters; <a:tab/> only defines tab stops.
    line_break_elements: &[b"br"],
    tab_elements: &[],
    collapsed_spaces: false,
};

/// OpenDocument `content.xml`.
pub const OPEN_DOCUMENT: TextLayout = TextLayout {
    text_elements: &[],
    block_elements: &[b"p", b"h", b"table-row"],
    block_separator: "\n",
    inline_elements: &[b"p", b"h", b"span"],
    line_break_elements: &[b"line-break"],
    tab_elements: &[b"tab"],
    collapsed_spaces: true,
};

pub fn extract_xml_text(xml: &str, layout: &TextLayout) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let capture_all = layout.text_elements.is_empty();
    let mut text_depth = 0usize;
    let mut inline_depth = 0usize;
    let mut out = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let local = e.local_name();
                // <a:br> usually carries run properties as a child.
                if inline_depth > 0 && layout.line_break_elements.contains(&local.as_ref()) {
                    out.push('\n');
                }
                if layout.text_elements.contains(&local.as_ref()) {
                    text_depth += 1;
                }
                if layout.inline_elements.contains(&local.as_ref()) {
                    inline_depth += 1;
                }
            }
            Event::End(e) => {
                let local = e.local_name();
                if layout.text_elements.contains(&local.as_ref()) {
                    text_depth = text_depth.saturating_sub(1);
                }
                if layout.inline_elements.contains(&local.as_ref()) {
                    inline_depth = inline_depth.saturating_sub(1);
                }
                if layout.block_elements.contains(&local.as_ref()) {
                    out.push_str(layout.block_separator);
                }
            }
            Event::Empty(e) => push_empty_element(&e, layout, inline_depth > 0, &mut out),
            Event::Text(e) if capture_all || text_depth > 0 => {
                out.push_str(&e.unescape()?);
            }
            Event::CData(e) if capture_all || text_depth > 0 => {
                out.push_str(&String::from_utf8_lossy(&e));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out.trim().to_string())
}

fn push_empty_element(e: &BytesStart<'_>, layout: &TextLayout, inline: bool, out: &mut String) {
    let local = e.local_name();
    match local.as_ref() {
        name if inline && layout.line_break_elements.contains(&name) => out.push('\n'),
        name if inline && layout.tab_elements.contains(&name) => out.push('\t'),
        // <text:s text:c="N"/>
        b"s" if inline && layout.collapsed_spaces => {
            let count = e
                .attributes()
                .flatten()
                .find(|attr| attr.key.local_name().as_ref() == b"c")
                .and_then(|attr| String::from_utf8_lossy(&attr.value).parse::<usize>().ok())
                .unwrap_or(1);
            out.extend(std::iter::repeat(' ').take(count));
        }
        name if layout.block_elements.contains(&name) => out.push_str(layout.block_separator),
        _ => {}
    }
}

/// Reads one archive entry as UTF-8 text.
pub fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    strategy: &'static str,
) -> Result<String, ConversionError> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| ConversionError::new(strategy, format!("missing {}: {}", name, e)))?;
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| ConversionError::new(strategy, format!("failed to read {}: {}", name, e)))?;
    Ok(content)
}

/// Local value of the first attribute whose local name matches `key`.
pub fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}
