use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use std::io::ErrorKind;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{DeleteResponse, DocumentRecord, OwnerQuery};

const PREVIEW_CACHE_CONTROL: &str = "public, max-age=3600";

pub async fn list_documents_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<DocumentRecord>>> {
    let documents = state.store.list_for_user(&user_id).await?;
    info!(user_id = %user_id, count = documents.len(), "Listed documents");
    Ok(Json(documents))
}

/// Streams the stored file back with its original media type.
pub async fn preview_document_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(owner): Query<OwnerQuery>,
) -> AppResult<Response> {
    let user_id = require_owner(owner)?;

    let document = state
        .store
        .find_for_user(id, &user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Document"))?;

    let path = state.config.upload_dir.join(&document.file_path);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(document_id = id, path = %path.display(), "Stored file is missing");
            return Err(AppError::not_found("Document file"));
        }
        Err(e) => return Err(e.into()),
    };

    let headers = [
        (header::CONTENT_TYPE, document.file_type.clone()),
        (
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", disposition_filename(&document.file_name)),
        ),
        (header::CACHE_CONTROL, PREVIEW_CACHE_CONTROL.to_string()),
    ];

    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

pub async fn delete_document_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(owner): Query<OwnerQuery>,
) -> AppResult<Json<DeleteResponse>> {
    let user_id = require_owner(owner)?;

    let document = state
        .store
        .delete_for_user(id, &user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Document"))?;

    let path = state.config.upload_dir.join(&document.file_path);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stored file"),
    }

    info!(document_id = id, user_id = %user_id, "Document deleted");
    Ok(Json(DeleteResponse::deleted()))
}

fn require_owner(owner: OwnerQuery) -> AppResult<String> {
    owner
        .user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::validation("Missing required parameters"))
}

/// Printable ASCII only, without quotes or backslashes.
fn disposition_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}
