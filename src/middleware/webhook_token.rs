//! Token compartilhado com o n8n (`X-Webhook-Token`)

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::AppState;

pub const HEADER_WEBHOOK_TOKEN: &str = "X-Webhook-Token";

/// Sem token configurado as rotas ficam fechadas (503)
pub async fn require_webhook_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let Some(expected) = state
        .settings
        .automacao
        .webhook_token
        .as_deref()
        .filter(|t| !t.is_empty())
    else {
        tracing::error!("🚨 APP_N8N_TOKEN não configurado - endpoints de automação bloqueados");
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "NOT_CONFIGURED"})),
        )
            .into_response());
    };

    let provided = headers.get(HEADER_WEBHOOK_TOKEN).and_then(|v| v.to_str().ok());
    if provided != Some(expected) {
        tracing::warn!("❌ X-Webhook-Token inválido ou ausente");
        return Err((StatusCode::UNAUTHORIZED, Json(json!({"error": "UNAUTHENTICATED"}))).into_response());
    }

    Ok(next.run(request).await)
}
