use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::utils::logging::*;
use crate::AppState;

pub async fn health_check() -> Json<Value> {
    log_health_check();

    Json(json!({
        "status": "healthy",
        "service": "gabinete-middleware",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Pronto quando o backend está configurado; integrações opcionais só são reportadas
pub async fn ready_check(State(state): State<Arc<AppState>>) -> Result<Json<Value>, StatusCode> {
    log_request_received("/ready", "GET");

    let dependencies = json!({
        "supabase": state.settings.supabase_configured(),
        "ia": state.assistente.is_some(),
        "telegram": state.telegram.is_some(),
        "whatsapp": state.whatsapp_sender.is_some(),
        "email": state.email.is_some(),
    });

    if !state.settings.supabase_configured() {
        log_warning("⚠️ Backend não configurado - serviço não está pronto");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(json!({
        "status": "ready",
        "dependencies": dependencies,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
