//! Endpoints de automação chamados pelo n8n
//!
//! O fluxo é o mesmo para todas as ações: reenvio com `Idempotency-Key`
//! devolve a resposta gravada, o remetente é resolvido pelo número em
//! `usuarios_whatsapp` e o cargo precisa permitir a ação. Toda resposta
//! (sucesso ou erro) fica registrada em `webhook_events`.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use supabase::{Query, TableBackend, TableBackendExt};

use crate::models::{PedidoAutomacao, UsuarioWhatsApp, WebhookEvent};
use crate::services::webhook_events::WebhookEventsService;
use crate::utils::logging::{log_error, log_info, log_warning};
use crate::utils::{AppError, AppResult};

pub const ORIGEM_N8N: &str = "inbound_from_n8n";
pub const TABELA_USUARIOS: &str = "usuarios_whatsapp";
pub const TABELA_AGENDA: &str = "agenda_eventos_whatsapp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcaoAutomacao {
    CriarEleitor,
    CriarDemanda,
    CriarIdeia,
    CriarIndicacao,
    CriarEvento,
    ListarEventos,
}

impl AcaoAutomacao {
    pub fn event_type(&self) -> &'static str {
        match self {
            AcaoAutomacao::CriarEleitor => "eleitores.create",
            AcaoAutomacao::CriarDemanda => "demandas.create",
            AcaoAutomacao::CriarIdeia => "ideias.create",
            AcaoAutomacao::CriarIndicacao => "indicacoes.create",
            AcaoAutomacao::CriarEvento => "agenda.create",
            AcaoAutomacao::ListarEventos => "agenda.list",
        }
    }
}

/// Permissões por cargo
pub fn cargo_permite(cargo: &str, acao: AcaoAutomacao) -> bool {
    use AcaoAutomacao::*;
    match cargo {
        "vereador" | "chefe_gabinete" => true,
        "assessor" => matches!(acao, CriarEleitor | CriarDemanda | CriarIdeia | ListarEventos),
        "estagiario" => matches!(acao, CriarEleitor | CriarDemanda | ListarEventos),
        _ => false,
    }
}

/// Status HTTP e corpo JSON devolvidos ao n8n
#[derive(Debug, Clone, PartialEq)]
pub struct RespostaAutomacao {
    pub status: u16,
    pub body: Value,
}

impl RespostaAutomacao {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn erro(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    fn interno() -> Self {
        Self::erro(500, json!({"error": "INTERNAL", "message": "Erro interno do servidor"}))
    }
}

/// Texto não vazio de `payload[campo]`
fn texto(payload: &Value, campo: &str) -> Option<String> {
    payload
        .get(campo)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn exigir(payload: &Value, campo: &str) -> AppResult<String> {
    texto(payload, campo).ok_or_else(|| AppError::ValidationError(format!("payload.{} é obrigatório", campo)))
}

fn ou_padrao(payload: &Value, campo: &str, padrao: Value) -> Value {
    payload.get(campo).filter(|v| !v.is_null()).cloned().unwrap_or(padrao)
}

pub struct AutomacaoService {
    db: Arc<dyn TableBackend>,
    eventos: WebhookEventsService,
}

impl AutomacaoService {
    pub fn new(db: Arc<dyn TableBackend>, eventos: WebhookEventsService) -> Self {
        Self { db, eventos }
    }

    pub async fn executar(&self, acao: AcaoAutomacao, corpo: Value, idempotency_key: Option<&str>) -> RespostaAutomacao {
        let idempotency_key = idempotency_key.map(str::trim).filter(|k| !k.is_empty());

        if let Some(chave) = idempotency_key {
            match self.eventos.resposta_registrada(chave).await {
                Ok(Some(registrada)) => {
                    log_info(&format!("🔁 {} repetido, devolvendo resposta gravada ({})", acao.event_type(), chave));
                    return RespostaAutomacao {
                        status: registrada.status_code,
                        body: registrada.response,
                    };
                }
                Ok(None) => {}
                Err(e) => log_warning(&format!("⚠️ Falha ao consultar idempotência {}: {}", chave, e)),
            }
        }

        let resposta = self.processar(acao, &corpo).await;

        self.eventos
            .registrar(&WebhookEvent {
                source: ORIGEM_N8N.to_string(),
                event_type: acao.event_type().to_string(),
                correlation_id: Some(uuid::Uuid::new_v4().to_string()),
                idempotency_key: idempotency_key.map(str::to_string),
                status_code: resposta.status,
                request: corpo,
                response: resposta.body.clone(),
            })
            .await;

        resposta
    }

    async fn processar(&self, acao: AcaoAutomacao, corpo: &Value) -> RespostaAutomacao {
        let pedido: PedidoAutomacao = match serde_json::from_value(corpo.clone()) {
            Ok(pedido) => pedido,
            Err(e) => {
                return RespostaAutomacao::erro(400, json!({"error": "INVALID_PAYLOAD", "message": e.to_string()}));
            }
        };

        let usuario = match self.resolver_usuario(&pedido.whatsapp_e164).await {
            Ok(Some(usuario)) => usuario,
            Ok(None) => {
                return RespostaAutomacao::erro(
                    404,
                    json!({
                        "error": "USER_NOT_FOUND_OR_NOT_LINKED",
                        "action": "ask_to_register_or_update_number",
                    }),
                );
            }
            Err(e) => {
                log_error(&format!("❌ Falha ao resolver remetente {}: {}", pedido.whatsapp_e164, e));
                return RespostaAutomacao::interno();
            }
        };

        if !cargo_permite(usuario.cargo_slug(), acao) {
            return RespostaAutomacao::erro(
                403,
                json!({"error": "FORBIDDEN_BY_ROLE", "message": "Seu cargo não permite esta ação."}),
            );
        }

        match self.executar_acao(acao, &usuario, &pedido).await {
            Ok(resposta) => resposta,
            Err(AppError::ValidationError(message)) => {
                RespostaAutomacao::erro(400, json!({"error": "INVALID_PAYLOAD", "message": message}))
            }
            Err(e) => {
                log_error(&format!("❌ Erro em {}: {}", acao.event_type(), e));
                RespostaAutomacao::interno()
            }
        }
    }

    /// Usuário ativo vinculado ao número
    pub async fn resolver_usuario(&self, whatsapp_e164: &str) -> AppResult<Option<UsuarioWhatsApp>> {
        let numero = whatsapp_e164.trim();
        if numero.is_empty() {
            return Ok(None);
        }
        let query = Query::new()
            .eq("whatsapp_e164", numero)
            .eq("ativo", true)
            .limit(1);
        Ok(self.db.select_one_as(TABELA_USUARIOS, &query).await?)
    }

    async fn inserir(&self, tabela: &str, row: Map<String, Value>) -> AppResult<Value> {
        Ok(self.db.insert(tabela, Value::Object(row)).await?)
    }

    async fn executar_acao(
        &self,
        acao: AcaoAutomacao,
        usuario: &UsuarioWhatsApp,
        pedido: &PedidoAutomacao,
    ) -> AppResult<RespostaAutomacao> {
        let payload = &pedido.payload;
        let mut row = Map::new();
        row.insert("gabinete_id".into(), json!(usuario.gabinete_id));

        let resposta = match acao {
            AcaoAutomacao::CriarEleitor => {
                row.insert("nome".into(), json!(exigir(payload, "nome")?));
                row.insert("telefone".into(), json!(texto(payload, "telefone_e164")));
                row.insert("endereco".into(), json!(texto(payload, "endereco").unwrap_or_default()));
                row.insert("tags".into(), ou_padrao(payload, "tags", json!([])));
                let eleitor = self.inserir("eleitores_whatsapp", row).await?;
                json!({"ok": true, "id": eleitor["id"], "message": "Eleitor cadastrado.", "data": eleitor})
            }
            AcaoAutomacao::CriarDemanda => {
                row.insert("titulo".into(), json!(exigir(payload, "titulo")?));
                row.insert("descricao".into(), json!(texto(payload, "descricao")));
                row.insert("status".into(), json!("ABERTA"));
                row.insert("anexos".into(), ou_padrao(payload, "anexos", json!([])));
                let demanda = self.inserir("demandas_whatsapp", row).await?;
                json!({
                    "ok": true,
                    "id": demanda["id"],
                    "status": demanda["status"],
                    "message": "Demanda criada.",
                    "data": demanda,
                })
            }
            AcaoAutomacao::CriarIdeia => {
                row.insert("titulo".into(), json!(exigir(payload, "titulo")?));
                row.insert("descricao".into(), json!(texto(payload, "descricao")));
                row.insert("origem".into(), json!("whatsapp"));
                row.insert("anexos".into(), ou_padrao(payload, "anexos", json!([])));
                let ideia = self.inserir("ideias_whatsapp", row).await?;
                json!({"ok": true, "id": ideia["id"], "message": "Ideia registrada.", "data": ideia})
            }
            AcaoAutomacao::CriarIndicacao => {
                row.insert("titulo".into(), json!(exigir(payload, "titulo")?));
                row.insert("descricao".into(), json!(texto(payload, "descricao")));
                row.insert("status".into(), json!("CRIADA"));
                let indicacao = self.inserir("indicacoes_whatsapp", row).await?;
                json!({
                    "ok": true,
                    "id": indicacao["id"],
                    "status": indicacao["status"],
                    "message": "Indicação criada.",
                    "data": indicacao,
                })
            }
            AcaoAutomacao::CriarEvento => {
                row.insert("criador_whatsapp".into(), json!(pedido.whatsapp_e164.trim()));
                row.insert("titulo".into(), json!(exigir(payload, "titulo")?));
                row.insert("descricao".into(), json!(texto(payload, "descricao")));
                row.insert("inicio".into(), json!(exigir(payload, "inicio")?));
                row.insert("fim".into(), json!(exigir(payload, "fim")?));
                row.insert("local".into(), json!(texto(payload, "local")));
                row.insert("meta".into(), ou_padrao(payload, "meta", json!({})));
                let evento = self.inserir(TABELA_AGENDA, row).await?;
                json!({"ok": true, "id": evento["id"], "message": "Evento criado.", "data": evento})
            }
            AcaoAutomacao::ListarEventos => {
                let mut query = Query::new()
                    .select("id,titulo,descricao,inicio,fim,local,meta,created_at,updated_at")
                    .eq("gabinete_id", usuario.gabinete_id.as_str())
                    .order("inicio", true);
                if let Some(de) = texto(payload, "from") {
                    query = query.gte("inicio", de);
                }
                if let Some(ate) = texto(payload, "to") {
                    query = query.lte("fim", ate);
                }
                if let Some(limite) = payload.get("limit").and_then(Value::as_u64).filter(|l| *l > 0) {
                    query = query.limit(limite as usize);
                }
                let itens = self.db.select(TABELA_AGENDA, &query).await?;
                json!({"ok": true, "count": itens.len(), "items": itens})
            }
        };

        Ok(RespostaAutomacao::ok(resposta))
    }
}
