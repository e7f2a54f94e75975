use axum::{extract::State, response::Json};
use std::sync::Arc;

use crate::middleware::UsuarioAutenticado;
use crate::models::{ActionRequest, ActionResponse, ChatIaRequest, ChatIaResponse};
use crate::utils::logging::*;
use crate::utils::{AppError, AppResult};
use crate::AppState;

/// Executa uma ação do interpretador de comandos (chamada entre serviços)
pub async fn executar_acao(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActionRequest>,
) -> Json<ActionResponse> {
    log_request_received("/ia/acoes", "POST");
    Json(state.comandos.executar(&request).await)
}

pub async fn chat_assistente(
    State(state): State<Arc<AppState>>,
    UsuarioAutenticado(user): UsuarioAutenticado,
    Json(request): Json<ChatIaRequest>,
) -> AppResult<Json<ChatIaResponse>> {
    log_request_received("/ia/chat", "POST");

    let assistente = state
        .assistente
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("Assistente de IA não configurado".to_string()))?;

    Ok(Json(assistente.conversar(&user.id, request).await?))
}
