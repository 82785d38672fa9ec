use axum::{extract::State, response::Json};
use tracing::{info, warn};

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{ChatRequest, ChatResponse};
use crate::services::AnswerRequest;

pub async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    let question = request.question.trim();
    if question.is_empty() || request.user_id.trim().is_empty() {
        return Err(AppError::validation("question and userId are required"));
    }

    info!(
        document_id = request.pdf_id,
        user_id = %request.user_id,
        include_reasoning = request.include_reasoning,
        "Chat request received"
    );

    let document = state
        .store
        .find_for_user(request.pdf_id, &request.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Document"))?;

    if document.content.trim().is_empty() {
        warn!(document_id = document.id, "Document content is empty");
        return Err(AppError::validation("Document content is empty"));
    }

    let answer = state
        .answers
        .answer(AnswerRequest {
            question: question.to_string(),
            document_text: document.content,
            want_reasoning: request.include_reasoning,
        })
        .await?;

    Ok(Json(ChatResponse {
        answer: answer.answer,
        reasoning: answer.reasoning,
    }))
}
