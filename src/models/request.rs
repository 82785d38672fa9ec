use serde::{Deserialize, Serialize};

use super::media_type;

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub pdf_id: i64,
    pub question: String,
    pub user_id: String,
    #[serde(default)]
    pub include_reasoning: bool,
}

/// `?userId=` on preview and delete routes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub size: usize,
    pub content: Vec<u8>,
    pub mime_type: String,
}

impl UploadedFile {
    pub fn new(name: String, content: Vec<u8>, mime_type: String) -> Self {
        let size = content.len();
        Self {
            name,
            size,
            content,
            mime_type,
        }
    }

    pub fn is_supported(&self) -> bool {
        media_type::is_supported(&self.mime_type)
    }

    /// Extension for the stored copy, taken from the original name when it has one.
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| media_type::default_extension(&self.mime_type).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_uses_camel_case() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"pdfId": 7, "question": "What?", "userId": "u1", "includeReasoning": true}"#,
        )
        .unwrap();
        assert_eq!(req.pdf_id, 7);
        assert!(req.include_reasoning);

        let req: ChatRequest =
            serde_json::from_str(r#"{"pdfId": 7, "question": "What?", "userId": "u1"}"#).unwrap();
        assert!(!req.include_reasoning);
    }

    #[test]
    fn test_extension_falls_back_to_media_type() {
        let file = UploadedFile::new("report.PDF".into(), vec![1], media_type::PDF.into());
        assert_eq!(file.extension(), "pdf");

        let file = UploadedFile::new("notes".into(), vec![1], media_type::TEXT.into());
        assert_eq!(file.extension(), "txt");

        let file = UploadedFile::new("evil.p/../x".into(), vec![1], media_type::CSV.into());
        assert_eq!(file.extension(), "csv");
    }
}
