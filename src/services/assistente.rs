//! Assessor IA: conversa persistida em `ia_conversations` / `ia_messages`

use ia_service::{ChatCompletion, ChatMessage, ChatRequest, IaServiceError};
use serde_json::{json, Value};
use std::sync::Arc;
use supabase::{Query, TableBackend, TableBackendExt};

use crate::config::prompts::fill;
use crate::config::Prompts;
use crate::services::AcessoService;
use crate::models::{AssessorConfig, ChatIaRequest, ChatIaResponse, Membro, MensagemConversa, Perfil};
use crate::utils::logging::{log_ai_call, log_ai_error};
use crate::utils::{truncate_chars, AppError, AppResult};

pub const TABELA_CONVERSAS: &str = "ia_conversations";
pub const TABELA_MENSAGENS: &str = "ia_messages";

const NOME_PADRAO: &str = "Assessor IA";
const COMPORTAMENTO_PADRAO: &str =
    "Responda de forma profissional, empática e objetiva, sempre orientando o gabinete para ações práticas.";

pub const MENSAGEM_LIMITE: &str = "Estou com muitos acessos agora e o modelo gratuito está temporariamente indisponível. Tente novamente em alguns instantes.";
pub const MENSAGEM_FALHA: &str = "Não consegui gerar uma resposta agora. Tente novamente em alguns instantes.";

pub struct AssistenteService {
    db: Arc<dyn TableBackend>,
    acesso: AcessoService,
    ia: Arc<dyn ChatCompletion>,
    prompts: Arc<Prompts>,
    chat_model: String,
}

impl AssistenteService {
    pub fn new(
        db: Arc<dyn TableBackend>,
        acesso: AcessoService,
        ia: Arc<dyn ChatCompletion>,
        prompts: Arc<Prompts>,
        chat_model: impl Into<String>,
    ) -> Self {
        Self {
            db,
            acesso,
            ia,
            prompts,
            chat_model: chat_model.into(),
        }
    }

    pub async fn conversar(&self, user_id: &str, request: ChatIaRequest) -> AppResult<ChatIaResponse> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AppError::ValidationError("Message is required".to_string()));
        }

        let gabinete_id = match request.gabinete_id.filter(|g| !g.trim().is_empty()) {
            Some(id) => {
                self.acesso.exigir_membro(user_id, &id).await?;
                Some(id)
            }
            None => self.gabinete_ativo(user_id).await?,
        };

        let conversation_id = match request.conversation_id.filter(|c| !c.trim().is_empty()) {
            Some(id) => {
                self.exigir_dono(&id, user_id).await?;
                id
            }
            None => self.nova_conversa(user_id, message, gabinete_id.as_deref()).await?,
        };

        self.salvar(&conversation_id, "user", message).await?;

        let historico: Vec<MensagemConversa> = self
            .db
            .select_as(
                TABELA_MENSAGENS,
                &Query::new()
                    .select("role,content")
                    .eq("conversation_id", conversation_id.as_str())
                    .order("created_at", true),
            )
            .await?;

        let system = self.prompt_sistema(user_id, gabinete_id.as_deref()).await?;
        let mut messages = vec![ChatMessage::system(system)];
        messages.extend(historico.into_iter().map(|m| ChatMessage::new(m.role, m.content)));

        let request = ChatRequest::new(messages)
            .with_model(self.chat_model.as_str())
            .with_temperature(0.7)
            .with_max_tokens(1000);

        log_ai_call("assessor ia", &self.chat_model);
        let resposta = match self.ia.complete(request).await {
            Ok(content) if !content.trim().is_empty() => content,
            Ok(_) => MENSAGEM_FALHA.to_string(),
            Err(IaServiceError::RateLimited(e)) => {
                log_ai_error("assessor ia", &e);
                MENSAGEM_LIMITE.to_string()
            }
            Err(e) => {
                log_ai_error("assessor ia", &e.to_string());
                MENSAGEM_FALHA.to_string()
            }
        };

        self.salvar(&conversation_id, "assistant", &resposta).await?;

        Ok(ChatIaResponse {
            message: resposta,
            conversation_id,
        })
    }

    /// Primeiro gabinete do usuário quando o cliente não informa um
    async fn gabinete_ativo(&self, user_id: &str) -> AppResult<Option<String>> {
        let membro: Option<Membro> = self
            .db
            .select_one_as("gabinete_usuarios", &Query::new().eq("user_id", user_id).limit(1))
            .await?;
        Ok(membro.map(|m| m.gabinete_id))
    }

    /// Só o autor da conversa continua o histórico
    async fn exigir_dono(&self, conversation_id: &str, user_id: &str) -> AppResult<()> {
        let conversa: Option<Value> = self
            .db
            .select_one_as(
                TABELA_CONVERSAS,
                &Query::new().select("id,user_id").eq("id", conversation_id).limit(1),
            )
            .await?;
        let conversa = conversa.ok_or_else(|| AppError::NotFound("Conversa não encontrada".to_string()))?;

        if conversa.get("user_id").and_then(Value::as_str) != Some(user_id) {
            return Err(AppError::Forbidden("Conversa pertence a outro usuário".to_string()));
        }
        Ok(())
    }

    async fn nova_conversa(&self, user_id: &str, message: &str, gabinete_id: Option<&str>) -> AppResult<String> {
        let row = self
            .db
            .insert(
                TABELA_CONVERSAS,
                json!({
                    "user_id": user_id,
                    "title": truncate_chars(message, 50),
                    "gabinete_id": gabinete_id,
                }),
            )
            .await?;

        row.get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::InternalError("Conversa criada sem id".to_string()))
    }

    async fn salvar(&self, conversation_id: &str, role: &str, content: &str) -> AppResult<()> {
        self.db
            .insert(
                TABELA_MENSAGENS,
                json!({
                    "conversation_id": conversation_id,
                    "role": role,
                    "content": content,
                }),
            )
            .await?;
        Ok(())
    }

    async fn prompt_sistema(&self, user_id: &str, gabinete_id: Option<&str>) -> AppResult<String> {
        let perfil: Option<Perfil> = self
            .db
            .select_one_as("profiles", &Query::new().eq("user_id", user_id).limit(1))
            .await?;

        let config = match gabinete_id {
            Some(gabinete_id) => self
                .db
                .select_one_as::<AssessorConfig>(
                    "meu_assessor_ia",
                    &Query::new()
                        .select("nome,comportamento")
                        .eq("gabinete_id", gabinete_id)
                        .order("created_at", false)
                        .limit(1),
                )
                .await
                .ok()
                .flatten()
                .unwrap_or_default(),
            None => AssessorConfig::default(),
        };

        let nome = config.nome.as_deref().filter(|n| !n.trim().is_empty()).unwrap_or(NOME_PADRAO);
        let comportamento = config
            .comportamento
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(COMPORTAMENTO_PADRAO);
        let parlamentar = perfil
            .as_ref()
            .and_then(|p| p.full_name.as_deref())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("um parlamentar");

        Ok(fill(
            &self.prompts.assistente_sistema,
            &[
                ("assistente", nome),
                ("parlamentar", parlamentar),
                ("gabinete_id", gabinete_id.unwrap_or("")),
                ("comportamento", comportamento),
            ],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeChat, FakeReply};
    use supabase::MemoryBackend;

    fn service(fake: Arc<FakeChat>) -> (Arc<MemoryBackend>, AssistenteService) {
        let db = Arc::new(MemoryBackend::new());
        db.seed("profiles", vec![json!({"user_id": "u1", "full_name": "Ana Souza"})]);
        db.seed("gabinete_usuarios", vec![json!({"gabinete_id": "gab-1", "user_id": "u1"})]);
        let service = AssistenteService::new(
            db.clone(),
            AcessoService::new(db.clone()),
            fake,
            Arc::new(Prompts::embedded().unwrap()),
            "google/gemini-2.0-flash-lite-preview-02-05:free",
        );
        (db, service)
    }

    fn pergunta(message: &str) -> ChatIaRequest {
        ChatIaRequest {
            message: message.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_nova_conversa_persiste_mensagens() {
        let fake = Arc::new(FakeChat::replying(&["Claro, posso ajudar."]));
        let (db, service) = service(fake.clone());

        let longa = "Preciso de ajuda para organizar a agenda da semana que vem com as visitas";
        let resposta = service.conversar("u1", pergunta(longa)).await.unwrap();
        assert_eq!(resposta.message, "Claro, posso ajudar.");

        let conversa = &db.rows(TABELA_CONVERSAS)[0];
        assert_eq!(conversa["title"].as_str().unwrap().chars().count(), 50);
        assert_eq!(conversa["gabinete_id"], "gab-1");

        let mensagens = db.rows(TABELA_MENSAGENS);
        assert_eq!(mensagens.len(), 2);
        assert_eq!(mensagens[0]["role"], "user");
        assert_eq!(mensagens[1]["role"], "assistant");

        let enviado = fake.last_request().unwrap();
        assert_eq!(enviado.temperature, Some(0.7));
        assert_eq!(enviado.max_tokens, Some(1000));
        assert!(enviado.messages[0].content.contains("Você é Assessor IA"));
        assert!(enviado.messages[0].content.contains("gabinete de Ana Souza"));
    }

    #[tokio::test]
    async fn test_historico_e_personalizacao_do_gabinete() {
        let fake = Arc::new(FakeChat::replying(&["primeira", "segunda"]));
        let (db, service) = service(fake.clone());
        db.seed(
            "meu_assessor_ia",
            vec![
                json!({"gabinete_id": "gab-1", "nome": "Antigo", "created_at": "2024-01-01T00:00:00Z"}),
                json!({"gabinete_id": "gab-1", "nome": "Jarbas", "comportamento": "Seja breve.", "created_at": "2025-01-01T00:00:00Z"}),
            ],
        );

        let primeira = service.conversar("u1", pergunta("oi")).await.unwrap();
        service
            .conversar(
                "u1",
                ChatIaRequest {
                    message: "e agora?".to_string(),
                    conversation_id: Some(primeira.conversation_id.clone()),
                    gabinete_id: Some("gab-1".to_string()),
                },
            )
            .await
            .unwrap();

        let enviado = fake.last_request().unwrap();
        assert!(enviado.messages[0].content.contains("Você é Jarbas"));
        assert!(enviado.messages[0].content.contains("Seja breve."));
        let conteudos: Vec<&str> = enviado.messages[1..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(conteudos, vec!["oi", "primeira", "e agora?"]);
        assert_eq!(db.rows(TABELA_CONVERSAS).len(), 1);
    }

    #[tokio::test]
    async fn test_conversa_de_outro_usuario() {
        let fake = Arc::new(FakeChat::replying(&["resposta"]));
        let (db, service) = service(fake.clone());
        db.seed(TABELA_CONVERSAS, vec![json!({"id": "conv-bia", "user_id": "u2", "title": "Agenda"})]);

        let alheia = ChatIaRequest {
            message: "me mostra o histórico".to_string(),
            conversation_id: Some("conv-bia".to_string()),
            gabinete_id: None,
        };
        assert!(matches!(service.conversar("u1", alheia).await, Err(AppError::Forbidden(_))));

        let inexistente = ChatIaRequest {
            message: "oi".to_string(),
            conversation_id: Some("conv-x".to_string()),
            gabinete_id: None,
        };
        assert!(matches!(service.conversar("u1", inexistente).await, Err(AppError::NotFound(_))));

        let outro_gabinete = ChatIaRequest {
            message: "oi".to_string(),
            conversation_id: None,
            gabinete_id: Some("gab-2".to_string()),
        };
        assert!(matches!(service.conversar("u1", outro_gabinete).await, Err(AppError::Forbidden(_))));

        assert!(db.rows(TABELA_MENSAGENS).is_empty());
        assert!(fake.last_request().is_none());
    }

    #[tokio::test]
    async fn test_limite_de_taxa_grava_mensagem_amigavel() {
        let (db, service) = service(Arc::new(FakeChat::with(FakeReply::RateLimited)));
        let resposta = service.conversar("u1", pergunta("oi")).await.unwrap();
        assert_eq!(resposta.message, MENSAGEM_LIMITE);
        assert_eq!(db.rows(TABELA_MENSAGENS)[1]["content"], MENSAGEM_LIMITE);
    }

    #[tokio::test]
    async fn test_falha_ou_resposta_vazia() {
        let (_, service) = service(Arc::new(FakeChat::replying(&["   "])));
        assert_eq!(service.conversar("u1", pergunta("oi")).await.unwrap().message, MENSAGEM_FALHA);

        let (_, service) = service_falha();
        assert_eq!(service.conversar("u1", pergunta("oi")).await.unwrap().message, MENSAGEM_FALHA);
    }

    fn service_falha() -> (Arc<MemoryBackend>, AssistenteService) {
        service(Arc::new(FakeChat::with(FakeReply::Failure)))
    }

    #[tokio::test]
    async fn test_mensagem_vazia() {
        let (_, service) = service(Arc::new(FakeChat::default()));
        assert!(matches!(
            service.conversar("u1", pergunta("  ")).await,
            Err(AppError::ValidationError(_))
        ));
    }
}
