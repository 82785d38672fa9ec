use async_trait::async_trait;
use lopdf::content::Content;
use lopdf::{Document, Object};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::text_decode::decode_pdf_string;
use super::{read_file, run_blocking, ExtractionStrategy};
use crate::error::ConversionError;

const STRATEGY: &str = "pdf";

/// TJ offsets at or below this (thousandths of a text-space unit) read as a word gap.
const WORD_GAP_THRESHOLD: f32 = -200.0;

/// Opens a PDF and yields the text runs of each page, in page order.
pub trait PdfBackend: Send + Sync + 'static {
    fn page_text_runs(&self, bytes: &[u8]) -> Result<Vec<Vec<String>>, ConversionError>;
}

/// Runs joined by a space within a page, pages joined by a newline, trimmed.
pub fn join_pages(pages: &[Vec<String>]) -> String {
    pages
        .iter()
        .map(|runs| runs.join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

pub struct PdfStrategy<B> {
    backend: Arc<B>,
}

impl<B: PdfBackend> PdfStrategy<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }
}

#[async_trait]
impl<B: PdfBackend> ExtractionStrategy for PdfStrategy<B> {
    fn name(&self) -> &'static str {
        STRATEGY
    }

    async fn extract(&self, path: &Path) -> Result<String, ConversionError> {
        let bytes = read_file(STRATEGY, path).await?;
        let backend = self.backend.clone();

        run_blocking(STRATEGY, move || {
            let pages = backend.page_text_runs(&bytes)?;
            debug!(pages = pages.len(), "Read PDF text layer");
            Ok(join_pages(&pages))
        })
        .await
    }
}

/// Text-layer reader over `lopdf` content streams.
pub struct LopdfBackend;

impl PdfBackend for LopdfBackend {
    fn page_text_runs(&self, bytes: &[u8]) -> Result<Vec<Vec<String>>, ConversionError> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| ConversionError::new(STRATEGY, format!("failed to open PDF: {}", e)))?;

        let mut pages = Vec::new();
        // get_pages is keyed by page number, so iteration is in page order.
        for (page_number, page_id) in doc.get_pages() {
            let raw = doc.get_page_content(page_id).map_err(|e| {
                ConversionError::new(STRATEGY, format!("page {}: {}", page_number, e))
            })?;
            let content = Content::decode(&raw).map_err(|e| {
                ConversionError::new(STRATEGY, format!("page {} content: {}", page_number, e))
            })?;
            pages.push(text_runs(&content));
        }

        Ok(pages)
    }
}

fn text_runs(content: &Content) -> Vec<String> {
    content
        .operations
        .iter()
        .filter_map(|op| match op.operator.as_str() {
            "Tj" | "'" => op.operands.first().map(string_operand),
            "\"" => op.operands.get(2).map(string_operand),
            "TJ" => op.operands.first().map(array_operand),
            _ => None,
        })
        .filter(|run| !run.trim().is_empty())
        .collect()
}

fn string_operand(obj: &Object) -> String {
    match obj {
        Object::String(bytes, _) => clean(&decode_pdf_string(bytes)),
        _ => String::new(),
    }
}

fn array_operand(obj: &Object) -> String {
    let Object::Array(items) = obj else {
        return String::new();
    };

    let mut run = String::new();
    for item in items {
        match item {
            Object::String(bytes, _) => run.push_str(&clean(&decode_pdf_string(bytes))),
            other => {
                if let Ok(offset) = other.as_float() {
                    if offset <= WORD_GAP_THRESHOLD && !run.ends_with(' ') {
                        run.push(' ');
                    }
                }
            }
        }
    }
    run
}

// Glyph ids from CID fonts decode to control characters; drop them so an
// unreadable text layer comes out empty and the chain moves on.
fn clean(text: &str) -> String {
    text.chars().filter(|c| !c.is_control()).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{dictionary, Stream};

    /// Builds a PDF with one `Tj` run per page.
    pub(crate) fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_join_pages() {
        let pages = vec![vec!["Hello".to_string()], vec!["World".to_string()]];
        assert_eq!(join_pages(&pages), "Hello\nWorld");

        let pages = vec![vec!["a".to_string(), "b".to_string()], vec![]];
        assert_eq!(join_pages(&pages), "a b");
        assert_eq!(join_pages(&[]), "");
    }

    #[test]
    fn test_lopdf_backend_reads_pages_in_order() {
        let bytes = build_pdf(&["Hello", "World"]);
        let pages = LopdfBackend.page_text_runs(&bytes).unwrap();
        assert_eq!(pages, vec![vec!["Hello".to_string()], vec!["World".to_string()]]);
    }

    #[test]
    fn test_zero_page_pdf_has_no_runs() {
        let bytes = build_pdf(&[]);
        let pages = LopdfBackend.page_text_runs(&bytes).unwrap();
        assert!(pages.is_empty());
        assert_eq!(join_pages(&pages), "");
    }

    #[test]
    fn test_garbage_is_conversion_error() {
        let err = LopdfBackend.page_text_runs(b"not a pdf at all").unwrap_err();
        assert_eq!(err.strategy, "pdf");
    }

    #[test]
    fn test_tj_array_kerning() {
        let array = Object::Array(vec![
            Object::string_literal("Hel"),
            Object::Integer(-20),
            Object::string_literal("lo"),
            Object::Integer(-600),
            Object::string_literal("there"),
        ]);
        assert_eq!(array_operand(&array), "Hello there");
    }

    #[tokio::test]
    async fn test_strategy_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.pdf");
        std::fs::write(&path, build_pdf(&["Hello", "World"])).unwrap();

        let text = PdfStrategy::new(LopdfBackend).extract(&path).await.unwrap();
        assert_eq!(text, "Hello\nWorld");
    }
}
