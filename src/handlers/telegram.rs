//! Webhook do bot do Telegram e código de pareamento

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use mensageria::Update;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::middleware::UsuarioAutenticado;
use crate::services::pareamento::{codigo_pareamento, link_pareamento, MENSAGEM_ERRO_TECNICO};
use crate::utils::logging::*;
use crate::utils::{AppError, AppResult};
use crate::AppState;

pub const HEADER_SECRET: &str = "X-Telegram-Bot-Api-Secret-Token";

pub async fn telegram_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> Result<Response, AppError> {
    log_request_received("/webhooks/telegram", "POST");

    if let Some(secret) = state.settings.telegram.webhook_secret.as_deref().filter(|s| !s.is_empty()) {
        let recebido = headers.get(HEADER_SECRET).and_then(|v| v.to_str().ok());
        if recebido != Some(secret) {
            return Err(AppError::Unauthorized("Secret do webhook inválido".to_string()));
        }
    }

    let Some(telegram) = state.telegram.clone() else {
        return Err(AppError::ServiceUnavailable("Bot do Telegram não configurado".to_string()));
    };

    // Telegram reentrega o mesmo update_id quando não recebe 200 a tempo
    let chave = format!("telegram:update:{}", update.update_id);
    let registro = serde_json::to_value(&update).unwrap_or_default();
    match state
        .webhook_events
        .primeira_entrega("telegram", "telegram.update", &chave, registro)
        .await
    {
        Ok(true) => {}
        Ok(false) => return Ok(Json(json!({"success": true, "duplicate": true})).into_response()),
        Err(e) => log_warning(&format!("⚠️ Não foi possível checar update repetido {}: {}", chave, e)),
    }

    let Some(message) = update.message() else {
        return Ok(Json(json!({"success": true})).into_response());
    };
    let Some(text) = message.text.as_deref().filter(|t| !t.trim().is_empty()) else {
        return Ok(Json(json!({"success": true})).into_response());
    };

    let telegram_user_id = message.from.as_ref().map(|u| u.id).unwrap_or(message.chat.id);
    let chat_id = message.chat.id.to_string();

    let resultado: AppResult<()> = async {
        let resposta = state.pareamento.responder(telegram_user_id, text).await?;
        telegram.send_text(&chat_id, &resposta).await?;
        Ok(())
    }
    .await;

    match resultado {
        Ok(()) => Ok(Json(json!({"success": true})).into_response()),
        Err(e) => {
            log_error(&format!("❌ Erro no webhook do Telegram: {}", e));
            if let Err(envio) = telegram.send_text(&chat_id, MENSAGEM_ERRO_TECNICO).await {
                log_warning(&format!("⚠️ Não foi possível avisar o usuário: {}", envio));
            }
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.message()}))).into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PareamentoQuery {
    #[serde(default)]
    pub gabinete_id: Option<String>,
}

/// Código `LEG-XXX-YYY` do usuário logado e o link direto para o bot
pub async fn codigo_telegram(
    State(state): State<Arc<AppState>>,
    UsuarioAutenticado(user): UsuarioAutenticado,
    Query(query): Query<PareamentoQuery>,
) -> AppResult<Json<serde_json::Value>> {
    log_request_received("/telegram/pareamento", "GET");

    let gabinete_id = query
        .gabinete_id
        .filter(|g| !g.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError("gabinete_id é obrigatório".to_string()))?;
    state.acesso.exigir_membro(&user.id, &gabinete_id).await?;

    let codigo = codigo_pareamento(&gabinete_id, &user.id);
    let bot = state.settings.telegram.bot_username.trim();
    let link = (!bot.is_empty()).then(|| link_pareamento(bot, &codigo));

    Ok(Json(json!({"codigo": codigo, "link": link})))
}
