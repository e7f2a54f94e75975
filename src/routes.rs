//! Montagem do router HTTP

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName,
    },
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    automacao, convites, documentos, eleitores, emails, health_check, ia, indicacoes, ready_check, telegram, two_factor,
    whatsapp,
};
use crate::middleware::{require_admin_key, require_webhook_token};
use crate::AppState;

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-app-base-url"),
            HeaderName::from_static("x-webhook-token"),
            HeaderName::from_static("idempotency-key"),
        ])
}

pub fn build_router(state: Arc<AppState>) -> Router {
    // Chamadas entre serviços, protegidas por X-Admin-Key
    let admin_routes = Router::new()
        .route("/ia/acoes", post(ia::executar_acao))
        .route("/emails", post(emails::enviar_email))
        .route("/convites/link", post(convites::gerar_link_convite))
        .layer(middleware::from_fn(require_admin_key));

    // Automações do n8n, protegidas por X-Webhook-Token
    let automacao_routes = Router::new()
        .route("/whatsapp-endpoints/eleitores/create", post(automacao::criar_eleitor))
        .route("/whatsapp-endpoints/demandas/create", post(automacao::criar_demanda))
        .route("/whatsapp-endpoints/ideias/create", post(automacao::criar_ideia))
        .route("/whatsapp-endpoints/indicacoes/create", post(automacao::criar_indicacao))
        .route("/whatsapp-endpoints/healthz", get(automacao::healthz))
        .route("/whatsapp-agenda/create", post(automacao::criar_evento))
        .route("/whatsapp-agenda/list", post(automacao::listar_eventos))
        .route("/whatsapp-agenda/healthz", get(automacao::healthz))
        .layer(middleware::from_fn_with_state(state.clone(), require_webhook_token));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        // Webhooks dos bots
        .route("/webhooks/telegram", post(telegram::telegram_webhook))
        .route(
            "/webhooks/whatsapp",
            get(whatsapp::whatsapp_verify).post(whatsapp::whatsapp_webhook),
        )
        .route("/telegram/pareamento", get(telegram::codigo_telegram))
        .route("/ia/chat", post(ia::chat_assistente))
        .route("/documentos/analisar", post(documentos::analisar_template))
        .route("/documentos/gerar", post(documentos::gerar_documento))
        .route("/auth/2fa/enviar", post(two_factor::enviar_codigo))
        .route("/auth/2fa/verificar", post(two_factor::verificar_codigo))
        .route("/convites", post(convites::criar_convite))
        .route("/convites/:token", get(convites::validar_convite))
        .route("/convites/:token/aceitar", post(convites::aceitar_convite))
        .route("/indicacoes", get(indicacoes::listar).post(indicacoes::criar))
        .route("/indicacoes/metricas", get(indicacoes::metricas))
        .route("/indicacoes/:id/eventos", get(indicacoes::eventos))
        .route("/indicacoes/:id/status", post(indicacoes::mover_status))
        .route("/indicacoes/:id/avancar", post(indicacoes::avancar))
        .route("/indicacoes/:id/observacoes", post(indicacoes::observacao))
        .route("/eleitores", post(eleitores::criar))
        .route("/eleitores/duplicidade", post(eleitores::duplicidade))
        .route("/eleitores/bairros/validar", post(eleitores::validar_bairro))
        .merge(admin_routes)
        .merge(automacao_routes)
        .with_state(state)
        .layer(cors())
        .layer(TraceLayer::new_for_http())
}
