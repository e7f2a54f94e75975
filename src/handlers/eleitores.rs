use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::middleware::UsuarioAutenticado;
use crate::models::{DuplicateCheck, DuplicateQuery, Eleitor, NovoEleitor, ValidarBairroRequest};
use crate::utils::logging::*;
use crate::utils::AppResult;
use crate::AppState;

pub async fn criar(
    State(state): State<Arc<AppState>>,
    UsuarioAutenticado(user): UsuarioAutenticado,
    Json(novo): Json<NovoEleitor>,
) -> AppResult<(StatusCode, Json<Eleitor>)> {
    log_request_received("/eleitores", "POST");
    state.acesso.exigir_membro(&user.id, &novo.gabinete_id).await?;
    let eleitor = state.eleitores.criar_eleitor(novo, Some(user.id.as_str())).await?;
    Ok((StatusCode::CREATED, Json(eleitor)))
}

pub async fn duplicidade(
    State(state): State<Arc<AppState>>,
    UsuarioAutenticado(user): UsuarioAutenticado,
    Json(query): Json<DuplicateQuery>,
) -> AppResult<Json<DuplicateCheck>> {
    log_request_received("/eleitores/duplicidade", "POST");
    state.acesso.exigir_membro(&user.id, &query.gabinete_id).await?;
    Ok(Json(state.eleitores.check_duplicate(&query).await?))
}

pub async fn validar_bairro(
    State(state): State<Arc<AppState>>,
    UsuarioAutenticado(user): UsuarioAutenticado,
    Json(request): Json<ValidarBairroRequest>,
) -> AppResult<Json<Value>> {
    log_request_received("/eleitores/bairros/validar", "POST");
    state.acesso.exigir_membro(&user.id, &request.gabinete_id).await?;
    let bairro = state.eleitores.validar_bairro(&request.gabinete_id, &request.nome).await?;
    Ok(Json(json!({"valid": true, "bairro": bairro})))
}
