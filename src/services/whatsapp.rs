//! Mensagens recebidas pelo webhook do WhatsApp Cloud API

use std::sync::Arc;
use supabase::{Query, TableBackend, TableBackendExt};

use crate::models::{ActionRequest, Membro, Perfil};
use crate::services::comandos::ComandosService;
use crate::utils::normalization::normalize_phone;
use crate::utils::AppResult;

pub const MENSAGEM_NUMERO_DESCONHECIDO: &str = "🤖 Olá! Eu sou o Assessor IA da Legisfy.\n\nAinda não encontrei uma conta com este número. Cadastre seu WhatsApp no seu perfil da Legisfy (Configurações > Perfil) e envie \"ajuda\" novamente.";

pub struct WhatsAppService {
    db: Arc<dyn TableBackend>,
    comandos: Arc<ComandosService>,
}

impl WhatsAppService {
    pub fn new(db: Arc<dyn TableBackend>, comandos: Arc<ComandosService>) -> Self {
        Self { db, comandos }
    }

    /// Perfil cujo WhatsApp normalizado coincide com o remetente
    pub async fn remetente(&self, from: &str) -> AppResult<Option<Perfil>> {
        let numero = normalize_phone(from);
        if numero.is_empty() {
            return Ok(None);
        }

        let perfis: Vec<Perfil> = self
            .db
            .select_as("profiles", &Query::new().select("user_id,full_name,whatsapp,main_role"))
            .await?;

        Ok(perfis
            .into_iter()
            .find(|p| p.whatsapp.as_deref().map(normalize_phone).as_deref() == Some(numero.as_str())))
    }

    pub async fn responder(&self, from: &str, text: &str) -> AppResult<String> {
        let Some(perfil) = self.remetente(from).await? else {
            return Ok(MENSAGEM_NUMERO_DESCONHECIDO.to_string());
        };

        let membro: Option<Membro> = self
            .db
            .select_one_as(
                "gabinete_usuarios",
                &Query::new().eq("user_id", perfil.user_id.as_str()).limit(1),
            )
            .await?;
        let Some(membro) = membro else {
            return Ok("❌ Conta encontrada, mas sem gabinete vinculado.".to_string());
        };

        let request = ActionRequest {
            user_id: perfil.user_id,
            user_name: Some(perfil.full_name.unwrap_or_else(|| "Usuário".to_string())),
            gabinete_id: membro.gabinete_id,
            user_role: perfil
                .main_role
                .or(membro.role)
                .unwrap_or_else(|| "assessor".to_string()),
            user_text: Some(text.trim().to_string()),
            ..Default::default()
        };

        Ok(self.comandos.executar(&request).await.message)
    }
}
