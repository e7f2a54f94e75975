use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::middleware::UsuarioAutenticado;
use crate::models::{
    Indicacao, IndicacaoMetricas, IndicacaoView, MoverStatusRequest, NovaIndicacao, StatusChangeOptions,
    StatusEvent,
};
use crate::utils::logging::*;
use crate::utils::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GabineteQuery {
    #[serde(default)]
    pub gabinete_id: Option<String>,
}

impl GabineteQuery {
    fn exigir(self) -> AppResult<String> {
        self.gabinete_id
            .filter(|g| !g.trim().is_empty())
            .ok_or_else(|| AppError::ValidationError("gabinete_id é obrigatório".to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct ObservacaoRequest {
    #[serde(default)]
    pub notes: String,
}

/// Carrega a indicação e confere o gabinete dela
async fn exigir_acesso(state: &AppState, user_id: &str, id: &str) -> AppResult<Indicacao> {
    let indicacao = state.indicacoes.carregar(id).await?;
    state.acesso.exigir_membro(user_id, &indicacao.gabinete_id).await?;
    Ok(indicacao)
}

pub async fn listar(
    State(state): State<Arc<AppState>>,
    UsuarioAutenticado(user): UsuarioAutenticado,
    Query(query): Query<GabineteQuery>,
) -> AppResult<Json<Vec<IndicacaoView>>> {
    log_request_received("/indicacoes", "GET");
    let gabinete_id = query.exigir()?;
    state.acesso.exigir_membro(&user.id, &gabinete_id).await?;
    Ok(Json(state.indicacoes.listar(&gabinete_id).await?))
}

pub async fn criar(
    State(state): State<Arc<AppState>>,
    UsuarioAutenticado(user): UsuarioAutenticado,
    Json(nova): Json<NovaIndicacao>,
) -> AppResult<(StatusCode, Json<Indicacao>)> {
    log_request_received("/indicacoes", "POST");
    state.acesso.exigir_membro(&user.id, &nova.gabinete_id).await?;
    let indicacao = state.indicacoes.criar(nova, Some(user.id.as_str())).await?;
    Ok((StatusCode::CREATED, Json(indicacao)))
}

pub async fn metricas(
    State(state): State<Arc<AppState>>,
    UsuarioAutenticado(user): UsuarioAutenticado,
    Query(query): Query<GabineteQuery>,
) -> AppResult<Json<IndicacaoMetricas>> {
    log_request_received("/indicacoes/metricas", "GET");
    let gabinete_id = query.exigir()?;
    state.acesso.exigir_membro(&user.id, &gabinete_id).await?;
    Ok(Json(state.indicacoes.metricas(&gabinete_id, chrono::Utc::now()).await?))
}

pub async fn eventos(
    State(state): State<Arc<AppState>>,
    UsuarioAutenticado(user): UsuarioAutenticado,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<StatusEvent>>> {
    log_request_received("/indicacoes/:id/eventos", "GET");
    exigir_acesso(&state, &user.id, &id).await?;
    Ok(Json(state.indicacoes.eventos(&id).await?))
}

pub async fn mover_status(
    State(state): State<Arc<AppState>>,
    UsuarioAutenticado(user): UsuarioAutenticado,
    Path(id): Path<String>,
    Json(request): Json<MoverStatusRequest>,
) -> AppResult<Json<StatusEvent>> {
    log_request_received("/indicacoes/:id/status", "POST");
    exigir_acesso(&state, &user.id, &id).await?;
    let evento = state
        .indicacoes
        .mover_status(&id, request.status, Some(user.id.as_str()), request.options)
        .await?;
    Ok(Json(evento))
}

/// Corpo opcional: `{pdf_url, protocolo, notes}`
pub async fn avancar(
    State(state): State<Arc<AppState>>,
    UsuarioAutenticado(user): UsuarioAutenticado,
    Path(id): Path<String>,
    options: Option<Json<StatusChangeOptions>>,
) -> AppResult<Json<StatusEvent>> {
    log_request_received("/indicacoes/:id/avancar", "POST");
    exigir_acesso(&state, &user.id, &id).await?;
    let options = options.map(|Json(o)| o).unwrap_or_default();
    Ok(Json(state.indicacoes.avancar(&id, Some(user.id.as_str()), options).await?))
}

pub async fn observacao(
    State(state): State<Arc<AppState>>,
    UsuarioAutenticado(user): UsuarioAutenticado,
    Path(id): Path<String>,
    Json(request): Json<ObservacaoRequest>,
) -> AppResult<(StatusCode, Json<StatusEvent>)> {
    log_request_received("/indicacoes/:id/observacoes", "POST");
    exigir_acesso(&state, &user.id, &id).await?;
    let evento = state
        .indicacoes
        .adicionar_observacao(&id, Some(user.id.as_str()), &request.notes)
        .await?;
    Ok((StatusCode::CREATED, Json(evento)))
}
