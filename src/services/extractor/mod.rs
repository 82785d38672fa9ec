//! Format-dispatching text extraction.
//!
//! Each declared media type maps to a primary [`ExtractionStrategy`]. The
//! dispatcher runs a fixed chain of at most three attempts, primary then the
//! generic extractor twice, and stops at the first attempt that yields
//! non-empty text. Strategy failures are values, not panics or early returns,
//! so recovery is just moving to the next link.

mod generic;
mod pdf;
mod plain_text;
mod spreadsheet;
mod text_decode;
mod word;
mod xml;

pub use generic::{ExternalConverter, GenericStrategy};
pub use pdf::{join_pages, LopdfBackend, PdfBackend, PdfStrategy};
pub use plain_text::PlainTextStrategy;
pub use spreadsheet::{render_workbook, SpreadsheetStrategy, Workbook, WorkbookReader, XlsxReader};
pub use word::WordStrategy;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{ConversionError, ExtractionError};
use crate::models::media_type::FormatFamily;

/// One way of turning a file into plain text.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(&self, path: &Path) -> Result<String, ConversionError>;
}

#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub file_path: PathBuf,
    pub declared_media_type: String,
}

impl ExtractionRequest {
    pub fn new(file_path: impl Into<PathBuf>, declared_media_type: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            declared_media_type: declared_media_type.into(),
        }
    }
}

/// Successful extraction. `text` is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    pub text: String,
    pub source_media_type: String,
}

pub struct Extractor {
    pdf: Arc<dyn ExtractionStrategy>,
    word: Arc<dyn ExtractionStrategy>,
    spreadsheet: Arc<dyn ExtractionStrategy>,
    plain_text: Arc<dyn ExtractionStrategy>,
    generic: Arc<dyn ExtractionStrategy>,
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            pdf: Arc::new(PdfStrategy::new(LopdfBackend)),
            word: Arc::new(WordStrategy::new()),
            spreadsheet: Arc::new(SpreadsheetStrategy::new(XlsxReader)),
            plain_text: Arc::new(PlainTextStrategy::new()),
            generic: Arc::new(GenericStrategy::new()),
        }
    }

    pub fn with_pdf(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.pdf = Arc::new(strategy);
        self
    }

    pub fn with_word(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.word = Arc::new(strategy);
        self
    }

    pub fn with_spreadsheet(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.spreadsheet = Arc::new(strategy);
        self
    }

    pub fn with_plain_text(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.plain_text = Arc::new(strategy);
        self
    }

    pub fn with_generic(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.generic = Arc::new(strategy);
        self
    }

    fn primary_for(&self, media_type: &str) -> Arc<dyn ExtractionStrategy> {
        match FormatFamily::from_media_type(media_type) {
            FormatFamily::Pdf => self.pdf.clone(),
            FormatFamily::Word => self.word.clone(),
            FormatFamily::Spreadsheet => self.spreadsheet.clone(),
            FormatFamily::PlainText => self.plain_text.clone(),
            FormatFamily::Presentation | FormatFamily::Other => self.generic.clone(),
        }
    }

    /// Primary strategy, generic fallback, generic final attempt.
    pub fn chain_for(&self, media_type: &str) -> Vec<Arc<dyn ExtractionStrategy>> {
        vec![
            self.primary_for(media_type),
            self.generic.clone(),
            self.generic.clone(),
        ]
    }

    pub async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractedDocument, ExtractionError> {
        let start = Instant::now();
        let media_type = request.declared_media_type.as_str();
        let path = request.file_path.as_path();

        info!(
            path = %path.display(),
            media_type = media_type,
            "Starting text extraction"
        );

        for (attempt, strategy) in self.chain_for(media_type).into_iter().enumerate() {
            debug!(attempt = attempt + 1, strategy = strategy.name(), "Running extraction strategy");

            match strategy.extract(path).await {
                Ok(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        info!(
                            strategy = strategy.name(),
                            attempt = attempt + 1,
                            text_length = text.len(),
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "Text extraction succeeded"
                        );
                        return Ok(ExtractedDocument {
                            text: text.to_string(),
                            source_media_type: media_type.to_string(),
                        });
                    }
                    warn!(
                        strategy = strategy.name(),
                        attempt = attempt + 1,
                        "Strategy produced no text, falling back"
                    );
                }
                Err(e) => {
                    warn!(
                        strategy = strategy.name(),
                        attempt = attempt + 1,
                        error = %e,
                        "Strategy failed, falling back"
                    );
                }
            }
        }

        error!(
            path = %path.display(),
            media_type = media_type,
            "No text content could be extracted from the document"
        );
        Err(ExtractionError {
            media_type: media_type.to_string(),
            path: request.file_path.clone(),
        })
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a CPU-bound parser on the blocking pool. A panicking parser is
/// reported as a conversion failure.
pub(crate) async fn run_blocking<F>(strategy: &'static str, f: F) -> Result<String, ConversionError>
where
    F: FnOnce() -> Result<String, ConversionError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ConversionError::new(strategy, format!("task join error: {}", e)))?
}

pub(crate) async fn read_file(strategy: &'static str, path: &Path) -> Result<Vec<u8>, ConversionError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| ConversionError::new(strategy, format!("failed to read {}: {}", path.display(), e)))
}
