use async_trait::async_trait;
use std::fs::File;
use std::path::Path;
use zip::ZipArchive;

use super::xml::{extract_xml_text, read_entry, WORDPROCESSING};
use super::{run_blocking, ExtractionStrategy};
use crate::error::ConversionError;

const STRATEGY: &str = "word";

/// Converts Word documents to text, one blank line between paragraphs.
///
/// Only the XML format is understood; legacy binary `.doc` files fail here
/// and are left to the generic extractor.
pub struct WordStrategy;

impl WordStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WordStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionStrategy for WordStrategy {
    fn name(&self) -> &'static str {
        STRATEGY
    }

    async fn extract(&self, path: &Path) -> Result<String, ConversionError> {
        let path = path.to_path_buf();
        run_blocking(STRATEGY, move || convert_docx(&path)).await
    }
}

pub(crate) fn convert_docx_archive<R: std::io::Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    strategy: &'static str,
) -> Result<String, ConversionError> {
    let xml = read_entry(archive, "word/document.xml", strategy)?;
    extract_xml_text(&xml, &WORDPROCESSING)
        .map_err(|e| ConversionError::new(strategy, format!("invalid document.xml: {}", e)))
}

fn convert_docx(path: &Path) -> Result<String, ConversionError> {
    let file = File::open(path)
        .map_err(|e| ConversionError::new(STRATEGY, format!("failed to open {}: {}", path.display(), e)))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| ConversionError::new(STRATEGY, format!("not a DOCX archive: {}", e)))?;
    convert_docx_archive(&mut archive, STRATEGY)
}
