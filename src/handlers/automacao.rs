//! Endpoints do n8n: cadastros pelo WhatsApp e agenda

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::services::automacao::{AcaoAutomacao, RespostaAutomacao};
use crate::utils::logging::*;
use crate::AppState;

pub const HEADER_IDEMPOTENCY_KEY: &str = "Idempotency-Key";

fn responder(resposta: RespostaAutomacao) -> Response {
    let status = StatusCode::from_u16(resposta.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(resposta.body)).into_response()
}

async fn executar(state: &AppState, acao: AcaoAutomacao, headers: &HeaderMap, corpo: Value) -> Response {
    log_request_received(acao.event_type(), "POST");
    let chave = headers.get(HEADER_IDEMPOTENCY_KEY).and_then(|v| v.to_str().ok());
    responder(state.automacao.executar(acao, corpo, chave).await)
}

pub async fn criar_eleitor(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(corpo): Json<Value>) -> Response {
    executar(&state, AcaoAutomacao::CriarEleitor, &headers, corpo).await
}

pub async fn criar_demanda(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(corpo): Json<Value>) -> Response {
    executar(&state, AcaoAutomacao::CriarDemanda, &headers, corpo).await
}

pub async fn criar_ideia(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(corpo): Json<Value>) -> Response {
    executar(&state, AcaoAutomacao::CriarIdeia, &headers, corpo).await
}

pub async fn criar_indicacao(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(corpo): Json<Value>,
) -> Response {
    executar(&state, AcaoAutomacao::CriarIndicacao, &headers, corpo).await
}

pub async fn criar_evento(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(corpo): Json<Value>) -> Response {
    executar(&state, AcaoAutomacao::CriarEvento, &headers, corpo).await
}

pub async fn listar_eventos(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(corpo): Json<Value>,
) -> Response {
    executar(&state, AcaoAutomacao::ListarEventos, &headers, corpo).await
}

pub async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok", "timestamp": chrono::Utc::now().to_rfc3339()}))
}
