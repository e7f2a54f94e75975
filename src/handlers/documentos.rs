use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::middleware::UsuarioAutenticado;
use crate::models::{AnalisarTemplateRequest, GerarDocumentoRequest};
use crate::utils::logging::*;
use crate::utils::AppError;
use crate::AppState;

/// Erros do cliente mantêm o status; o resto vira 500 com `details`
fn falha(contexto: &'static str, erro: AppError) -> Response {
    if matches!(
        erro,
        AppError::ValidationError(_) | AppError::NotFound(_) | AppError::Unauthorized(_) | AppError::Forbidden(_)
    ) {
        return erro.into_response();
    }

    log_error(&format!("❌ {}: {}", contexto, erro));
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": contexto, "details": erro.message()})),
    )
        .into_response()
}

pub async fn analisar_template(
    State(state): State<Arc<AppState>>,
    UsuarioAutenticado(_user): UsuarioAutenticado,
    Json(request): Json<AnalisarTemplateRequest>,
) -> Result<Json<Value>, Response> {
    log_request_received("/documentos/analisar", "POST");

    state
        .documentos
        .analisar_template(request)
        .await
        .map(Json)
        .map_err(|e| falha("Failed to analyze PDF template", e))
}

pub async fn gerar_documento(
    State(state): State<Arc<AppState>>,
    UsuarioAutenticado(user): UsuarioAutenticado,
    Json(request): Json<GerarDocumentoRequest>,
) -> Result<Json<Value>, Response> {
    log_request_received("/documentos/gerar", "POST");

    if let Some(template_id) = request.template_id.as_deref().filter(|t| !t.trim().is_empty()) {
        let template = state
            .documentos
            .carregar_template(template_id)
            .await
            .map_err(|e| falha("Failed to generate document", e))?;
        state
            .acesso
            .exigir_membro(&user.id, &template.gabinete_id)
            .await
            .map_err(|e| falha("Failed to generate document", e))?;
    }

    state
        .documentos
        .gerar_documento(request, Some(user.id.as_str()))
        .await
        .map(Json)
        .map_err(|e| falha("Failed to generate document", e))
}
