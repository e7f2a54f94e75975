use axum::{extract::State, response::Json};
use serde_json::Value;
use std::sync::Arc;

use crate::models::EmailRequest;
use crate::services::email::validar_pedido;
use crate::utils::logging::*;
use crate::utils::{AppError, AppResult};
use crate::AppState;

/// Dispara um e-mail transacional; o pedido é validado antes de olhar a configuração
pub async fn enviar_email(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EmailRequest>,
) -> AppResult<Json<Value>> {
    log_request_received("/emails", "POST");

    if let Err(e) = validar_pedido(&request) {
        log_validation_error("email", &e.message());
        return Err(e);
    }

    let email = state
        .email
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("RESEND_API_KEY não configurada".to_string()))?;

    Ok(Json(email.despachar(&request).await?))
}
