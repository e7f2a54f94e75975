//! Registro de eventos de webhook (`webhook_events`)
//!
//! Cada evento recebido vira uma linha de auditoria. A mesma tabela responde
//! reenvios: chaves de idempotência devolvem a resposta gravada e ids de
//! mensagens já vistos não são processados de novo.

use serde_json::Value;
use std::sync::Arc;
use supabase::{Query, TableBackend, TableBackendExt};

use crate::models::WebhookEvent;
use crate::utils::logging::{log_error, log_info};
use crate::utils::AppResult;

pub const TABELA_WEBHOOK_EVENTS: &str = "webhook_events";

/// Resposta gravada para uma chave de idempotência
#[derive(Debug, Clone, PartialEq)]
pub struct RespostaRegistrada {
    pub status_code: u16,
    pub response: Value,
}

#[derive(Clone)]
pub struct WebhookEventsService {
    db: Arc<dyn TableBackend>,
}

impl WebhookEventsService {
    pub fn new(db: Arc<dyn TableBackend>) -> Self {
        Self { db }
    }

    pub async fn resposta_registrada(&self, idempotency_key: &str) -> AppResult<Option<RespostaRegistrada>> {
        let query = Query::new()
            .eq("idempotency_key", idempotency_key)
            .order("created_at", true)
            .limit(1);
        let evento: Option<WebhookEvent> = self.db.select_one_as(TABELA_WEBHOOK_EVENTS, &query).await?;

        Ok(evento
            .filter(|e| !e.response.is_null())
            .map(|e| RespostaRegistrada {
                status_code: e.status_code,
                response: e.response,
            }))
    }

    /// Falha ao gravar não interrompe a resposta ao chamador
    pub async fn registrar(&self, evento: &WebhookEvent) {
        let row = match serde_json::to_value(evento) {
            Ok(mut row) => {
                row["processed_at"] = Value::String(chrono::Utc::now().to_rfc3339());
                row
            }
            Err(e) => {
                log_error(&format!("Falha ao serializar evento de webhook: {}", e));
                return;
            }
        };

        if let Err(e) = self.db.insert(TABELA_WEBHOOK_EVENTS, row).await {
            log_error(&format!("Falha ao registrar evento {}: {}", evento.event_type, e));
        }
    }

    /// `true` na primeira entrega de `chave`; reentregas retornam `false`
    pub async fn primeira_entrega(&self, source: &str, event_type: &str, chave: &str, request: Value) -> AppResult<bool> {
        let existente = self
            .db
            .count(TABELA_WEBHOOK_EVENTS, &Query::new().eq("idempotency_key", chave))
            .await?;
        if existente > 0 {
            log_info(&format!("🔁 {} repetido ignorado: {}", event_type, chave));
            return Ok(false);
        }

        self.registrar(&WebhookEvent {
            source: source.to_string(),
            event_type: event_type.to_string(),
            correlation_id: None,
            idempotency_key: Some(chave.to_string()),
            status_code: 200,
            request,
            response: Value::Null,
        })
        .await;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use supabase::MemoryBackend;

    fn service() -> (Arc<MemoryBackend>, WebhookEventsService) {
        let db = Arc::new(MemoryBackend::new());
        (db.clone(), WebhookEventsService::new(db))
    }

    #[tokio::test]
    async fn test_registrar_e_reaproveitar_resposta() {
        let (db, service) = service();
        assert!(service.resposta_registrada("chave-1").await.unwrap().is_none());

        service
            .registrar(&WebhookEvent {
                source: "inbound_from_n8n".to_string(),
                event_type: "demandas.create".to_string(),
                correlation_id: Some("c1".to_string()),
                idempotency_key: Some("chave-1".to_string()),
                status_code: 404,
                request: json!({"whatsapp_e164": "+5527999990000"}),
                response: json!({"error": "USER_NOT_FOUND_OR_NOT_LINKED"}),
            })
            .await;

        let registrada = service.resposta_registrada("chave-1").await.unwrap().unwrap();
        assert_eq!(registrada.status_code, 404);
        assert_eq!(registrada.response["error"], "USER_NOT_FOUND_OR_NOT_LINKED");
        assert!(db.rows(TABELA_WEBHOOK_EVENTS)[0]["processed_at"].is_string());
    }

    #[tokio::test]
    async fn test_primeira_entrega() {
        let (db, service) = service();
        let update = json!({"update_id": 7});

        assert!(service
            .primeira_entrega("telegram", "telegram.update", "telegram:update:7", update.clone())
            .await
            .unwrap());
        assert!(!service
            .primeira_entrega("telegram", "telegram.update", "telegram:update:7", update)
            .await
            .unwrap());

        let linhas = db.rows(TABELA_WEBHOOK_EVENTS);
        assert_eq!(linhas.len(), 1);
        assert_eq!(linhas[0]["source"], "telegram");
        // Entregas de bots não viram resposta para replay
        assert!(service.resposta_registrada("telegram:update:7").await.unwrap().is_none());
    }
}
