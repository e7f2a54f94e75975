//! Webhook do WhatsApp Cloud API

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use mensageria::{verify_signature, verify_subscription, IncomingMessage, Verification, WebhookPayload};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::utils::logging::*;
use crate::utils::AppError;
use crate::AppState;

pub const HEADER_ASSINATURA: &str = "X-Hub-Signature-256";

/// Handshake de inscrição do webhook
pub async fn whatsapp_verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    log_request_received("/webhooks/whatsapp", "GET");

    let verificacao = verify_subscription(
        params.get("hub.mode").map(String::as_str),
        params.get("hub.verify_token").map(String::as_str),
        params.get("hub.challenge").map(String::as_str),
        &state.settings.whatsapp.verify_token,
    );

    match verificacao {
        Verification::Challenge(challenge) => {
            log_info("✅ Webhook do WhatsApp verificado");
            ([(header::CONTENT_TYPE, "text/plain")], challenge).into_response()
        }
        Verification::Forbidden => {
            log_warning("❌ Token de verificação do WhatsApp inválido");
            StatusCode::FORBIDDEN.into_response()
        }
        Verification::MissingParams => (StatusCode::BAD_REQUEST, "Parâmetros hub.* ausentes").into_response(),
    }
}

/// Confirma o recebimento na hora e responde as mensagens em segundo plano
pub async fn whatsapp_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, AppError> {
    log_request_received("/webhooks/whatsapp", "POST");

    if let Some(secret) = state.settings.whatsapp.app_secret.as_deref().filter(|s| !s.is_empty()) {
        let assinatura = headers.get(HEADER_ASSINATURA).and_then(|v| v.to_str().ok());
        if let Err(e) = verify_signature(secret, assinatura, &body) {
            log_warning(&format!("❌ Assinatura do WhatsApp rejeitada: {}", e));
            return Err(AppError::Unauthorized("Assinatura inválida".to_string()));
        }
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            log_warning(&format!("⚠️ Payload do WhatsApp ignorado: {}", e));
            return Ok("EVENT_RECEIVED");
        }
    };

    let mut mensagens: Vec<IncomingMessage> = Vec::new();
    for mensagem in payload.text_messages() {
        if primeira_entrega(&state, mensagem).await {
            mensagens.push(mensagem.clone());
        }
    }

    if !mensagens.is_empty() {
        tokio::spawn(processar_mensagens(state, mensagens));
    }

    Ok("EVENT_RECEIVED")
}

/// A Meta reentrega mensagens; o wamid evita responder duas vezes
async fn primeira_entrega(state: &AppState, mensagem: &IncomingMessage) -> bool {
    let chave = format!("whatsapp:message:{}", mensagem.id);
    let registro = json!({"id": mensagem.id, "from": mensagem.from, "timestamp": mensagem.timestamp});
    match state
        .webhook_events
        .primeira_entrega("whatsapp", "whatsapp.message", &chave, registro)
        .await
    {
        Ok(primeira) => primeira,
        Err(e) => {
            log_warning(&format!("⚠️ Não foi possível checar mensagem repetida {}: {}", chave, e));
            true
        }
    }
}

async fn processar_mensagens(state: Arc<AppState>, mensagens: Vec<IncomingMessage>) {
    for mensagem in mensagens {
        let (from, text) = (mensagem.from.as_str(), mensagem.text_body().unwrap_or_default());

        let resposta = match state.whatsapp.responder(from, text).await {
            Ok(resposta) => resposta,
            Err(e) => {
                log_error(&format!("❌ Erro ao processar mensagem do WhatsApp de {}: {}", from, e));
                continue;
            }
        };

        match &state.whatsapp_sender {
            Some(sender) => {
                if let Err(e) = sender.send_text(from, &resposta).await {
                    log_error(&format!("❌ Falha ao responder {} no WhatsApp: {}", from, e));
                }
            }
            None => log_integration_disabled("WhatsApp", "resposta não enviada, cliente não configurado"),
        }
    }
}
