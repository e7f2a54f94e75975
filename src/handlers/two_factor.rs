use axum::{extract::State, response::Json};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::utils::logging::*;
use crate::utils::AppResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EnviarCodigoRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerificarCodigoRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
}

pub async fn enviar_codigo(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EnviarCodigoRequest>,
) -> AppResult<Json<Value>> {
    log_request_received("/auth/2fa/enviar", "POST");
    Ok(Json(state.two_factor.enviar_codigo(&request.email).await?))
}

pub async fn verificar_codigo(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerificarCodigoRequest>,
) -> AppResult<Json<Value>> {
    log_request_received("/auth/2fa/verificar", "POST");
    Ok(Json(state.two_factor.verificar_codigo(&request.email, &request.code).await?))
}
