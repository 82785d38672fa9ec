pub mod chat;
pub mod documents;
pub mod health;
pub mod upload;

pub use chat::*;
pub use documents::*;
pub use health::*;
pub use upload::*;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::Config;
use crate::error::AppResult;
use crate::middleware::{logging_middleware, rate_limit_middleware, RequestLimiter};
use crate::services::{AnswerService, DocumentStore, Extractor, GroqClient};

/// Multipart framing and the `userId` field on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub extractor: Arc<Extractor>,
    pub answers: Arc<AnswerService>,
    pub store: DocumentStore,
    pub limiter: Arc<RequestLimiter>,
}

impl AppState {
    pub fn new(
        config: Config,
        extractor: Extractor,
        answers: AnswerService,
        store: DocumentStore,
    ) -> Self {
        let limiter = Arc::new(RequestLimiter::new(config.max_concurrent_requests));
        Self {
            config: Arc::new(config),
            extractor: Arc::new(extractor),
            answers: Arc::new(answers),
            store,
            limiter,
        }
    }

    /// Production wiring: default extractors, Groq completions, SQLite at `database_path`.
    pub fn from_config(config: Config) -> AppResult<Self> {
        let completions = Arc::new(GroqClient::new(&config.llm)?);
        let answers = AnswerService::new(completions, &config);
        let store = DocumentStore::open(&config.database_path)?;
        Ok(Self::new(config, Extractor::new(), answers, store))
    }
}

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size_bytes() + MULTIPART_OVERHEAD_BYTES;
    let timeout = Duration::from_secs(state.config.request_timeout_seconds);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/api/upload", post(upload_handler))
        // GET takes a user id here, DELETE a document id.
        .route(
            "/api/pdfs/:key",
            get(list_documents_handler).delete(delete_document_handler),
        )
        .route("/api/pdf/:id", get(preview_document_handler))
        .route("/api/chat", post(chat_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(axum::middleware::from_fn(logging_middleware))
                .layer(TimeoutLayer::new(timeout))
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(axum::middleware::from_fn_with_state(
                    state.limiter.clone(),
                    rate_limit_middleware,
                )),
        )
        .with_state(state)
}
