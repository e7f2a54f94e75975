//! Códigos de autenticação em dois fatores enviados por e-mail

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use supabase::{Query, TableBackend, TableBackendExt};
use tracing::info;

use crate::models::EmailType;
use crate::services::email::EmailService;
use crate::utils::normalization::normalize_email;
use crate::utils::{AppError, AppResult};

pub const TABELA_CODIGOS: &str = "two_factor_codes";
pub const VALIDADE_MINUTOS: i64 = 5;

#[derive(Debug, Deserialize)]
struct CodigoRow {
    id: String,
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn gerar_codigo() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

pub struct TwoFactorService {
    db: Arc<dyn TableBackend>,
    email: Option<Arc<EmailService>>,
    app_url: String,
}

impl TwoFactorService {
    pub fn new(db: Arc<dyn TableBackend>, email: Option<Arc<EmailService>>, app_url: impl Into<String>) -> Self {
        Self {
            db,
            email,
            app_url: app_url.into(),
        }
    }

    pub async fn enviar_codigo(&self, email: &str) -> AppResult<Value> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AppError::ValidationError("Email é obrigatório".to_string()));
        }
        let Some(sender) = &self.email else {
            return Err(AppError::ServiceUnavailable("Envio de email não configurado".to_string()));
        };

        let code = gerar_codigo();
        let expires_at = Utc::now() + Duration::minutes(VALIDADE_MINUTOS);
        self.db
            .insert(
                TABELA_CODIGOS,
                json!({
                    "email": email,
                    "code": code,
                    "expires_at": timestamp(expires_at),
                    "used": false,
                }),
            )
            .await?;

        let vars = vec![
            ("codigo", code.clone()),
            ("code", code),
            ("email", email.clone()),
            ("expires_minutes", VALIDADE_MINUTOS.to_string()),
            ("link", format!("{}/auth", self.app_url.trim_end_matches('/'))),
        ];
        sender.enviar(EmailType::TwoFactorCode, &email, &vars).await?;
        info!("🔐 Código 2FA enviado para {}", email);

        Ok(json!({
            "success": true,
            "message": "Código de autenticação enviado para seu email",
            "expires_in": VALIDADE_MINUTOS * 60,
        }))
    }

    pub async fn verificar_codigo(&self, email: &str, code: &str) -> AppResult<Value> {
        let email = normalize_email(email);
        let code = code.trim();
        if email.is_empty() || code.chars().count() != 6 {
            return Err(AppError::ValidationError("Parâmetros inválidos".to_string()));
        }

        let query = Query::new()
            .select("id,code,expires_at,used")
            .eq("email", email.as_str())
            .eq("code", code)
            .eq("used", false)
            .gte("expires_at", timestamp(Utc::now()))
            .order("created_at", false)
            .limit(1);
        let registro: CodigoRow = self
            .db
            .select_one_as(TABELA_CODIGOS, &query)
            .await?
            .ok_or_else(|| AppError::NotFound("Código não encontrado ou expirado".to_string()))?;

        let atualizados = self
            .db
            .update(
                TABELA_CODIGOS,
                &Query::new().eq("id", registro.id.as_str()).eq("used", false),
                json!({"used": true}),
            )
            .await
            .map_err(|_| AppError::InternalError("Falha ao confirmar código".to_string()))?;
        if atualizados.is_empty() {
            return Err(AppError::InternalError("Falha ao confirmar código".to_string()));
        }

        Ok(json!({"success": true}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingEmail;
    use supabase::MemoryBackend;

    fn service() -> (Arc<MemoryBackend>, Arc<RecordingEmail>, TwoFactorService) {
        let db = Arc::new(MemoryBackend::new());
        let sender = Arc::new(RecordingEmail::default());
        let email = Arc::new(EmailService::new(db.clone(), sender.clone(), "https://app.legisfy.app.br"));
        let service = TwoFactorService::new(db.clone(), Some(email), "https://app.legisfy.app.br");
        (db, sender, service)
    }

    #[test]
    fn test_gerar_codigo_seis_digitos() {
        for _ in 0..50 {
            let code = gerar_codigo();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn test_enviar_e_verificar() {
        let (db, sender, service) = service();

        let resposta = service.enviar_codigo("  Ana@Exemplo.com ").await.unwrap();
        assert_eq!(resposta["expires_in"], 300);

        let linha = db.rows(TABELA_CODIGOS)[0].clone();
        assert_eq!(linha["email"], "ana@exemplo.com");
        let code = linha["code"].as_str().unwrap().to_string();

        let enviado = &sender.emails()[0];
        assert_eq!(enviado.subject, "Seu código de autenticação - Legisfy");
        assert!(enviado.html.contains(&code));

        let ok = service.verificar_codigo("ana@exemplo.com", &code).await.unwrap();
        assert_eq!(ok, json!({"success": true}));
        assert_eq!(db.rows(TABELA_CODIGOS)[0]["used"], true);

        let repetido = service.verificar_codigo("ana@exemplo.com", &code).await;
        assert!(matches!(repetido, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_codigo_expirado_ou_invalido() {
        let (db, _, service) = service();
        db.seed(
            TABELA_CODIGOS,
            vec![json!({"id": "c1", "email": "ana@exemplo.com", "code": "123456", "used": false, "expires_at": "2020-01-01T00:00:00.000Z"})],
        );

        assert!(matches!(
            service.verificar_codigo("ana@exemplo.com", "123456").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.verificar_codigo("ana@exemplo.com", "12345").await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(service.enviar_codigo(" ").await, Err(AppError::ValidationError(_))));
    }
}
