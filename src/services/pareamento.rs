//! Bot do Telegram: pareamento de contas e encaminhamento de comandos
//!
//! Um usuário do Telegram é vinculado a um usuário do gabinete por código
//! (`/start LEG-ABC-DEF`), e-mail ou telefone. Depois de vinculado, todo texto
//! vai para o interpretador de comandos.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;
use supabase::{Query, TableBackend, TableBackendExt};

use crate::models::{ActionRequest, Gabinete, Membro, Perfil, TelegramVinculo};
use crate::services::comandos::ComandosService;
use crate::utils::logging::{log_info, log_pairing_completed};
use crate::utils::normalization::{format_name_short, normalize_email, only_digits};
use crate::utils::AppResult;

pub const TABELA_VINCULOS: &str = "ia_telegram_users";

pub const MENSAGEM_ERRO_TECNICO: &str =
    "❌ Tive um problema técnico ao processar seu pedido. Pode tentar novamente em alguns instantes?";

const MENSAGEM_APRESENTACAO: &str = "🤖 <b>Olá! Eu sou o Assessor IA da Legisfy.</b>\n\nAinda não identifiquei sua conta. Envie uma das informações abaixo para conectar:\n\n1️⃣ <b>Código</b>: Use <code>/start</code> + código (ex: <code>/start LEG-A1B-C2D</code>)\n2️⃣ <b>E-mail</b>: Digite seu e-mail cadastrado.\n3️⃣ <b>Telefone</b>: Digite seu celular (ex: <code>27999998888</code>).";

static TELEFONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[\d\s\-\(\)]+$").expect("regex válida"));

/// `LEG-` + 3 primeiros caracteres do gabinete + 3 últimos do usuário
pub fn codigo_pareamento(gabinete_id: &str, user_id: &str) -> String {
    let cab: String = gabinete_id.chars().take(3).collect();
    let chars: Vec<char> = user_id.chars().collect();
    let user: String = chars[chars.len().saturating_sub(3)..].iter().collect();
    format!("LEG-{}-{}", cab.to_uppercase(), user.to_uppercase())
}

pub fn link_pareamento(bot_username: &str, codigo: &str) -> String {
    format!("https://t.me/{}?start={}", bot_username.trim_start_matches('@'), codigo)
}

fn parece_email(text: &str) -> bool {
    text.contains('@') && text.contains('.')
}

fn parece_telefone(text: &str) -> bool {
    text.chars().count() >= 8 && TELEFONE.is_match(text)
}

pub fn mensagem_boas_vindas(metodo: &str, perfil: Option<&Perfil>, gabinete: &str) -> String {
    let full_name = perfil.and_then(|p| p.full_name.as_deref()).unwrap_or("");
    let politico = perfil.and_then(|p| p.main_role.as_deref()) == Some("politico");

    if politico {
        format!(
            "✅ <b>Conectado com sucesso {}!</b>\n\nBem-vindo, <b>Vereador {}</b>.\n\nIdentifiquei seu acesso ao <b>{}</b>. Agora você já pode me enviar comandos ou áudios.",
            metodo, full_name, gabinete
        )
    } else {
        let primeiros: String = full_name.split_whitespace().take(2).collect::<Vec<_>>().join(" ");
        format!(
            "✅ <b>Conectado com sucesso {}!</b>\n\nOlá, <b>{}</b>.\n\nJá identifiquei seu acesso ao <b>{}</b>. Estou pronto para te ajudar no dia a dia do gabinete.",
            metodo, primeiros, gabinete
        )
    }
}

pub struct PareamentoService {
    db: Arc<dyn TableBackend>,
    comandos: Arc<ComandosService>,
}

impl PareamentoService {
    pub fn new(db: Arc<dyn TableBackend>, comandos: Arc<ComandosService>) -> Self {
        Self { db, comandos }
    }

    /// Resposta para uma mensagem de texto recebida pelo bot
    pub async fn responder(&self, telegram_user_id: i64, text: &str) -> AppResult<String> {
        let text = text.trim();

        if let Some(codigo) = text.strip_prefix("/start LEG-") {
            return self.parear_por_codigo(telegram_user_id, codigo).await;
        }
        if parece_email(text) {
            return self.parear_por_email(telegram_user_id, text).await;
        }
        if parece_telefone(text) {
            return self.parear_por_telefone(telegram_user_id, text).await;
        }

        let Some(vinculo) = self.vinculo(telegram_user_id).await? else {
            return Ok(MENSAGEM_APRESENTACAO.to_string());
        };

        let perfil = self.perfil(&vinculo.user_id).await?.unwrap_or_default();
        let request = ActionRequest {
            user_id: vinculo.user_id,
            user_name: Some(perfil.full_name.unwrap_or_else(|| "Usuário".to_string())),
            gabinete_id: vinculo.gabinete_id,
            user_role: perfil.main_role.unwrap_or_else(|| "assessor".to_string()),
            user_text: Some(text.to_string()),
            ..Default::default()
        };

        Ok(self.comandos.executar(&request).await.message)
    }

    pub async fn vinculo(&self, telegram_user_id: i64) -> AppResult<Option<TelegramVinculo>> {
        let query = Query::new().eq("telegram_user_id", telegram_user_id).limit(1);
        Ok(self.db.select_one_as(TABELA_VINCULOS, &query).await?)
    }

    async fn perfil(&self, user_id: &str) -> AppResult<Option<Perfil>> {
        let query = Query::new().eq("user_id", user_id).limit(1);
        Ok(self.db.select_one_as("profiles", &query).await?)
    }

    async fn membro(&self, user_id: &str) -> AppResult<Option<Membro>> {
        let query = Query::new().eq("user_id", user_id).limit(1);
        Ok(self.db.select_one_as("gabinete_usuarios", &query).await?)
    }

    /// `codigo` sem o prefixo `LEG-`
    async fn parear_por_codigo(&self, telegram_user_id: i64, codigo: &str) -> AppResult<String> {
        let codigo = codigo.split_whitespace().next().unwrap_or("");
        let partes: Vec<String> = codigo.split('-').map(str::to_lowercase).collect();
        if partes.len() < 2 {
            return Ok("❌ Código inválido.".to_string());
        }
        let (cab_prefix, user_suffix) = (&partes[0], &partes[1]);

        let gabinetes: Vec<Gabinete> = self.db.select_as("gabinetes", &Query::new().select("id")).await?;
        for gabinete in gabinetes.iter().filter(|g| g.id.to_lowercase().starts_with(cab_prefix.as_str())) {
            let membros: Vec<Membro> = self
                .db
                .select_as("gabinete_usuarios", &Query::new().eq("gabinete_id", gabinete.id.as_str()))
                .await?;

            if let Some(membro) = membros
                .iter()
                .find(|m| m.user_id.to_lowercase().ends_with(user_suffix.as_str()))
            {
                return self
                    .finalizar(telegram_user_id, &membro.user_id, &gabinete.id, "via código")
                    .await;
            }
        }

        Ok("❌ Não encontrei gabinete/usuário para este código.".to_string())
    }

    async fn parear_por_email(&self, telegram_user_id: i64, email: &str) -> AppResult<String> {
        let query = Query::new().ilike("email", normalize_email(email)).limit(1);
        let Some(perfil) = self.db.select_one_as::<Perfil>("profiles", &query).await? else {
            return Ok(format!("❌ Não encontrei nenhuma conta com o e-mail: {}", email));
        };

        match self.membro(&perfil.user_id).await? {
            Some(membro) => {
                self.finalizar(telegram_user_id, &perfil.user_id, &membro.gabinete_id, "via e-mail")
                    .await
            }
            None => Ok("❌ Conta encontrada, mas sem gabinete vinculado.".to_string()),
        }
    }

    async fn parear_por_telefone(&self, telegram_user_id: i64, telefone: &str) -> AppResult<String> {
        let digitos = only_digits(telefone);
        let perfis: Vec<Perfil> = self
            .db
            .select_as("profiles", &Query::new().select("user_id,whatsapp"))
            .await?;

        let encontrado = perfis.into_iter().find(|p| {
            let numero = only_digits(p.whatsapp.as_deref().unwrap_or(""));
            !numero.is_empty() && (numero.ends_with(&digitos) || digitos.ends_with(&numero))
        });

        let Some(perfil) = encontrado else {
            return Ok(format!("❌ Não encontrei conta com o telefone: {}", telefone));
        };

        match self.membro(&perfil.user_id).await? {
            Some(membro) => {
                self.finalizar(telegram_user_id, &perfil.user_id, &membro.gabinete_id, "via telefone")
                    .await
            }
            None => Ok("❌ Conta encontrada, mas sem gabinete vinculado.".to_string()),
        }
    }

    async fn finalizar(&self, telegram_user_id: i64, user_id: &str, gabinete_id: &str, metodo: &str) -> AppResult<String> {
        self.db
            .upsert(
                TABELA_VINCULOS,
                json!({
                    "telegram_user_id": telegram_user_id,
                    "user_id": user_id,
                    "gabinete_id": gabinete_id,
                }),
                "telegram_user_id",
            )
            .await?;
        log_pairing_completed(metodo, telegram_user_id, gabinete_id);

        let perfil = self.perfil(user_id).await?;
        let gabinete: Option<Gabinete> = self
            .db
            .select_one_as("gabinetes", &Query::new().eq("id", gabinete_id).limit(1))
            .await?;
        let nome_gabinete = gabinete.as_ref().map(Gabinete::display_name).unwrap_or("seu gabinete");

        log_info(&format!(
            "🔗 Telegram {} vinculado a {}",
            telegram_user_id,
            format_name_short(perfil.as_ref().and_then(|p| p.full_name.as_deref()))
        ));
        Ok(mensagem_boas_vindas(metodo, perfil.as_ref(), nome_gabinete))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prompts;
    use supabase::MemoryBackend;

    fn service() -> (Arc<MemoryBackend>, PareamentoService) {
        let db = Arc::new(MemoryBackend::new());
        db.seed(
            "gabinetes",
            vec![json!({"id": "abc12345-gab", "nome": "Gabinete Vereadora Ana"})],
        );
        db.seed(
            "gabinete_usuarios",
            vec![
                json!({"gabinete_id": "abc12345-gab", "user_id": "user-0001-xyz", "role": "politico"}),
                json!({"gabinete_id": "abc12345-gab", "user_id": "user-0002-qwe", "role": "assessor"}),
            ],
        );
        db.seed(
            "profiles",
            vec![
                json!({"user_id": "user-0001-xyz", "full_name": "Ana Maria Souza", "email": "ana@camara.gov.br", "whatsapp": "+55 (27) 99999-8888", "main_role": "politico"}),
                json!({"user_id": "user-0002-qwe", "full_name": "Bruno Lima Costa", "email": "bruno@camara.gov.br", "whatsapp": "", "main_role": "assessor"}),
                json!({"user_id": "user-sem-gab", "full_name": "Carla", "email": "carla@mail.com"}),
            ],
        );

        let comandos = Arc::new(ComandosService::new(
            db.clone(),
            None,
            Arc::new(Prompts::embedded().unwrap()),
            "openai/gpt-4o-mini",
        ));
        (db.clone(), PareamentoService::new(db, comandos))
    }

    #[test]
    fn test_codigo_e_link() {
        let codigo = codigo_pareamento("abc12345-gab", "user-0002-qwe");
        assert_eq!(codigo, "LEG-ABC-QWE");
        assert_eq!(
            link_pareamento("@LegisfyBot", &codigo),
            "https://t.me/LegisfyBot?start=LEG-ABC-QWE"
        );
    }

    #[test]
    fn test_deteccao_de_telefone() {
        assert!(parece_telefone("+55 (27) 99999-8888"));
        assert!(!parece_telefone("1234567"));
        assert!(!parece_telefone("ajuda 12345678"));
    }

    #[tokio::test]
    async fn test_pareamento_por_codigo() {
        let (db, service) = service();
        let resposta = service.responder(42, "/start LEG-ABC-QWE").await.unwrap();

        assert!(resposta.starts_with("✅ <b>Conectado com sucesso via código!</b>"));
        assert!(resposta.contains("Olá, <b>Bruno Lima</b>."));
        assert!(resposta.contains("<b>Gabinete Vereadora Ana</b>"));

        let vinculos = db.rows(TABELA_VINCULOS);
        assert_eq!(vinculos.len(), 1);
        assert_eq!(vinculos[0]["user_id"], "user-0002-qwe");
    }

    #[tokio::test]
    async fn test_codigo_invalido_e_desconhecido() {
        let (_, service) = service();
        assert_eq!(service.responder(1, "/start LEG-ABC").await.unwrap(), "❌ Código inválido.");
        assert_eq!(
            service.responder(1, "/start LEG-ZZZ-QWE").await.unwrap(),
            "❌ Não encontrei gabinete/usuário para este código."
        );
    }

    #[tokio::test]
    async fn test_pareamento_por_email_politico() {
        let (_, service) = service();
        let resposta = service.responder(7, " ANA@camara.gov.br ").await.unwrap();
        assert!(resposta.contains("via e-mail"));
        assert!(resposta.contains("Bem-vindo, <b>Vereador Ana Maria Souza</b>."));
    }

    #[tokio::test]
    async fn test_email_sem_gabinete_e_inexistente() {
        let (_, service) = service();
        assert_eq!(
            service.responder(7, "carla@mail.com").await.unwrap(),
            "❌ Conta encontrada, mas sem gabinete vinculado."
        );
        assert_eq!(
            service.responder(7, "ninguem@mail.com").await.unwrap(),
            "❌ Não encontrei nenhuma conta com o e-mail: ninguem@mail.com"
        );
    }

    #[tokio::test]
    async fn test_pareamento_por_telefone_ignora_numeros_vazios() {
        let (db, service) = service();
        let resposta = service.responder(9, "27999998888").await.unwrap();
        assert!(resposta.contains("via telefone"));
        assert_eq!(db.rows(TABELA_VINCULOS)[0]["user_id"], "user-0001-xyz");

        assert_eq!(
            service.responder(9, "11 3333-4444").await.unwrap(),
            "❌ Não encontrei conta com o telefone: 11 3333-4444"
        );
    }

    #[tokio::test]
    async fn test_repareamento_substitui_vinculo() {
        let (db, service) = service();
        service.responder(42, "/start LEG-ABC-QWE").await.unwrap();
        service.responder(42, "/start LEG-ABC-XYZ").await.unwrap();

        let vinculos = db.rows(TABELA_VINCULOS);
        assert_eq!(vinculos.len(), 1);
        assert_eq!(vinculos[0]["user_id"], "user-0001-xyz");
    }

    #[tokio::test]
    async fn test_usuario_nao_vinculado_recebe_apresentacao() {
        let (_, service) = service();
        let resposta = service.responder(5, "oi").await.unwrap();
        assert!(resposta.contains("Ainda não identifiquei sua conta"));
    }

    #[tokio::test]
    async fn test_usuario_vinculado_executa_comando() {
        let (db, service) = service();
        db.seed(
            TABELA_VINCULOS,
            vec![json!({"telegram_user_id": 5, "user_id": "user-0002-qwe", "gabinete_id": "abc12345-gab"})],
        );

        let resposta = service.responder(5, "ajuda").await.unwrap();
        assert!(resposta.contains("Comandos disponíveis para assessor"));
    }
}
