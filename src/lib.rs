//! docqa: document upload and question-answering service
//!
//! Uploaded documents (PDF, Office, OpenDocument, RTF, text) are converted
//! to plain text through a chain of format-specific extractors with a
//! generic fallback, stored, and later used as context for LLM answers.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use handlers::{create_router, AppState};
