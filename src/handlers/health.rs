use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::AppState;
use crate::error::AppResult;
use crate::services::extractor::GenericStrategy;

const LEGACY_CONVERTERS: &[&str] = &["antiword", "catppt", "xls2csv"];

/// Health check endpoint
pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    info!("Health check requested");

    let database = state.store.ping().await.is_ok();
    let llm_configured = !state.config.llm.api_key.is_empty();
    let converters = tokio::task::spawn_blocking(|| {
        LEGACY_CONVERTERS
            .iter()
            .map(|name| (name.to_string(), Value::Bool(GenericStrategy::is_converter_available(name))))
            .collect::<serde_json::Map<String, Value>>()
    })
    .await?;

    let metrics = state.limiter.metrics();

    let status = if database && llm_configured {
        "healthy"
    } else {
        "degraded"
    };

    let response = json!({
        "status": status,
        "timestamp": chrono::Utc::now().timestamp(),
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "database": database,
            "llm_configured": llm_configured,
            "legacy_converters": converters,
        },
        "rate_limiting": metrics,
    });

    info!(
        status = status,
        database = database,
        llm_configured = llm_configured,
        "Health check completed"
    );

    Ok(Json(response))
}

/// Readiness check endpoint; ready once the database answers.
pub async fn ready_handler(State(state): State<AppState>) -> StatusCode {
    match state.store.ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "Readiness check failed - database unavailable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
