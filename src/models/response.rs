use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored document row, serialized with the column names clients already use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    pub id: i64,
    pub user_id: String,
    pub file_name: String,
    pub file_path: String,
    pub content: String,
    pub file_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub file: DocumentRecord,
    pub file_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub reasoning: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

impl UploadResponse {
    pub fn new(file: DocumentRecord) -> Self {
        let file_type = file.file_type.clone();
        Self {
            success: true,
            file,
            file_type,
        }
    }
}

impl DeleteResponse {
    pub fn deleted() -> Self {
        Self {
            success: true,
            message: "Document deleted successfully".to_string(),
        }
    }
}
