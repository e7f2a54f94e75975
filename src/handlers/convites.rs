use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::middleware::UsuarioAutenticado;
use crate::models::{Convite, ConviteCriado, GerarLinkRequest, NovoConvite};
use crate::services::convites::gerar_link;
use crate::utils::normalization::normalize_email;
use crate::utils::logging::*;
use crate::utils::{AppError, AppResult};
use crate::AppState;

pub const HEADER_BASE_URL: &str = "x-app-base-url";

/// Base dos links: header do app, senão a configuração
fn base_url(headers: &HeaderMap, state: &AppState) -> String {
    headers
        .get(HEADER_BASE_URL)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| state.settings.app.base_url.clone())
}

pub async fn gerar_link_convite(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<GerarLinkRequest>,
) -> AppResult<Json<Value>> {
    log_request_received("/convites/link", "POST");

    let email = normalize_email(&request.email);
    if email.is_empty() || request.role.trim().is_empty() || request.token.trim().is_empty() {
        return Err(AppError::ValidationError("email, role e token são obrigatórios".to_string()));
    }

    let link = gerar_link(request.role.trim(), request.token.trim(), &email, &base_url(&headers, &state));
    Ok(Json(json!({"success": true, "action_link": link})))
}

pub async fn criar_convite(
    State(state): State<Arc<AppState>>,
    UsuarioAutenticado(user): UsuarioAutenticado,
    headers: HeaderMap,
    Json(novo): Json<NovoConvite>,
) -> AppResult<(StatusCode, Json<ConviteCriado>)> {
    log_request_received("/convites", "POST");
    state.acesso.exigir_membro(&user.id, &novo.gabinete_id).await?;

    let base = base_url(&headers, &state);
    let criado = state.convites.criar_convite(novo, &user.id, &base).await?;
    Ok((StatusCode::CREATED, Json(criado)))
}

pub async fn validar_convite(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> AppResult<Json<Convite>> {
    log_request_received("/convites/:token", "GET");
    Ok(Json(state.convites.validar_convite(&token).await?))
}

pub async fn aceitar_convite(
    State(state): State<Arc<AppState>>,
    UsuarioAutenticado(user): UsuarioAutenticado,
    Path(token): Path<String>,
) -> AppResult<Json<Convite>> {
    log_request_received("/convites/:token/aceitar", "POST");
    Ok(Json(state.convites.aceitar_convite(&token, &user).await?))
}
