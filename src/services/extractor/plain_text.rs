use async_trait::async_trait;
use std::path::Path;

use super::text_decode::decode_text;
use super::{read_file, ExtractionStrategy};
use crate::error::ConversionError;

const STRATEGY: &str = "plain_text";

/// Reads `text/plain` and `text/csv` files as-is.
pub struct PlainTextStrategy;

impl PlainTextStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlainTextStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionStrategy for PlainTextStrategy {
    fn name(&self) -> &'static str {
        STRATEGY
    }

    async fn extract(&self, path: &Path) -> Result<String, ConversionError> {
        let bytes = read_file(STRATEGY, path).await?;
        Ok(decode_text(&bytes).trim().to_string())
    }
}
