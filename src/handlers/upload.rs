use axum::{
    extract::{Multipart, State},
    response::Json,
};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::models::media_type;
use crate::models::{UploadResponse, UploadedFile};
use crate::services::{ExtractionRequest, NewDocument};

#[derive(Debug)]
struct UploadForm {
    file: UploadedFile,
    user_id: String,
}

/// Accepts a `document` file part and a `userId` text part, extracts the
/// text and stores both the record and the file.
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();

    let UploadForm { file, user_id } = read_upload_form(&mut multipart).await?;
    info!(
        request_id = %request_id,
        file_name = %file.name,
        file_size = file.size,
        media_type = %file.mime_type,
        user_id = %user_id,
        "Upload received"
    );

    if !file.is_supported() {
        warn!(request_id = %request_id, media_type = %file.mime_type, "Unsupported media type");
        return Err(AppError::UnsupportedMediaType {
            mime_type: file.mime_type,
        });
    }

    let max_size_bytes = state.config.max_file_size_bytes();
    if file.size > max_size_bytes {
        warn!(
            request_id = %request_id,
            file_size = file.size,
            max_size = max_size_bytes,
            "File size exceeds limit"
        );
        return Err(AppError::FileTooLarge {
            size: file.size / (1024 * 1024),
            limit: state.config.max_file_size_mb,
        });
    }

    let extension = file.extension();
    let stored_name = format!("doc-{}.{}", uuid::Uuid::new_v4(), extension);
    let file_type = media_type::normalize(&file.mime_type);

    // Dropping the temp file removes it, so any early return below leaves nothing behind.
    let temp = tempfile::Builder::new()
        .prefix(".upload-")
        .suffix(&format!(".{}", extension))
        .tempfile_in(&state.config.upload_dir)?;
    tokio::fs::write(temp.path(), &file.content).await?;

    let extracted = state
        .extractor
        .extract(&ExtractionRequest::new(temp.path(), file_type.clone()))
        .await
        .map_err(|e| {
            error!(request_id = %request_id, error = %e, "Extraction failed");
            e
        })?;

    let record = state
        .store
        .insert(NewDocument {
            user_id,
            file_name: file.name,
            file_path: stored_name.clone(),
            content: extracted.text,
            file_type,
        })
        .await?;

    let destination = state.config.upload_dir.join(&stored_name);
    if let Err(e) = temp.persist(&destination) {
        error!(request_id = %request_id, error = %e, "Failed to store uploaded file");
        // Keep the table consistent with what is on disk.
        state.store.delete_for_user(record.id, &record.user_id).await?;
        return Err(AppError::internal(format!("Failed to store uploaded file: {}", e.error)));
    }

    info!(
        request_id = %request_id,
        document_id = record.id,
        stored_as = %stored_name,
        text_length = record.content.len(),
        total_time_ms = start.elapsed().as_millis() as u64,
        "Upload processed"
    );

    Ok(Json(UploadResponse::new(record)))
}

async fn read_upload_form(multipart: &mut Multipart) -> AppResult<UploadForm> {
    let mut file = None;
    let mut user_id = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::InvalidFile {
        message: format!("Failed to read multipart field: {}", e),
    })? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "document" => {
                let file_name = field.file_name().unwrap_or("document").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();

                let data = field.bytes().await.map_err(|e| AppError::InvalidFile {
                    message: format!("Failed to read file data: {}", e),
                })?;

                if data.is_empty() {
                    return Err(AppError::InvalidFile {
                        message: "File is empty".to_string(),
                    });
                }

                debug!(file_name = %file_name, size = data.len(), content_type = %content_type, "Read document part");
                file = Some(UploadedFile::new(file_name, data.to_vec(), content_type));
            }
            "userId" => {
                let value = field.text().await.map_err(|e| AppError::InvalidFile {
                    message: format!("Failed to read userId: {}", e),
                })?;
                user_id = Some(value.trim().to_string());
            }
            other => debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    let file = file.ok_or(AppError::MissingFile)?;
    let user_id = user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::validation("userId is required"))?;

    Ok(UploadForm { file, user_id })
}
