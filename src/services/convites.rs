//! Convites de equipe: criação, links de aceite, validação e aceite

use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use supabase::{AuthUser, Query, TableBackend, TableBackendExt};
use tracing::{info, warn};

use crate::models::convite::{STATUS_ACCEPTED, STATUS_CANCELLED, STATUS_PENDING};
use crate::models::{Convite, ConviteCriado, EmailType, Gabinete, NovoConvite, Perfil};
use crate::services::email::{EmailService, Variaveis};
use crate::utils::normalization::normalize_email;
use crate::utils::{AppError, AppResult};

pub const TABELA_CONVITES: &str = "invitations";
pub const VALIDADE_DIAS: i64 = 7;

const CARGOS_CONVIDAVEIS: [&str; 4] = ["politico", "chefe_gabinete", "assessor", "atendente"];

/// Link de aceite: político vai para o onboarding, equipe para o aceite com email e cargo
pub fn gerar_link(role: &str, token: &str, email: &str, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if role == "politico" {
        format!("{}/onboarding?token={}", base, token)
    } else {
        format!(
            "{}/aceitar-convite-equipe?token={}&email={}&role={}",
            base,
            token,
            urlencoding::encode(email),
            role
        )
    }
}

pub struct ConvitesService {
    db: Arc<dyn TableBackend>,
    email: Option<Arc<EmailService>>,
}

impl ConvitesService {
    pub fn new(db: Arc<dyn TableBackend>, email: Option<Arc<EmailService>>) -> Self {
        Self { db, email }
    }

    async fn gabinete(&self, gabinete_id: &str) -> Option<Gabinete> {
        self.db
            .select_one_as("gabinetes", &Query::new().eq("id", gabinete_id).limit(1))
            .await
            .ok()
            .flatten()
    }

    pub async fn criar_convite(&self, novo: NovoConvite, invited_by: &str, base_url: &str) -> AppResult<ConviteCriado> {
        let email = normalize_email(&novo.email);
        let role = novo.role.trim().to_string();
        let gabinete_id = novo.gabinete_id.trim().to_string();

        if email.is_empty() || gabinete_id.is_empty() {
            return Err(AppError::ValidationError("email, role e gabinete_id são obrigatórios".to_string()));
        }
        if !CARGOS_CONVIDAVEIS.contains(&role.as_str()) {
            return Err(AppError::ValidationError(format!("Cargo inválido: {}", role)));
        }

        let pendentes = self
            .db
            .count(
                TABELA_CONVITES,
                &Query::new()
                    .eq("email", email.as_str())
                    .eq("gabinete_id", gabinete_id.as_str())
                    .eq("status", STATUS_PENDING),
            )
            .await?;
        if pendentes > 0 {
            return Err(AppError::Conflict(
                "Já existe um convite pendente para este email neste gabinete".to_string(),
            ));
        }

        let token = uuid::Uuid::new_v4().to_string();
        let name = novo.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
        let row = self
            .db
            .insert(
                TABELA_CONVITES,
                json!({
                    "token": token,
                    "email": email,
                    "name": name,
                    "role": role,
                    "gabinete_id": gabinete_id,
                    "invited_by": invited_by,
                    "status": STATUS_PENDING,
                    "expires_at": (Utc::now() + Duration::days(VALIDADE_DIAS)).to_rfc3339(),
                }),
            )
            .await?;
        let invitation: Convite = serde_json::from_value(row)?;
        let action_link = gerar_link(&role, &token, &email, base_url);

        if let (Some(sender), Some(tipo)) = (&self.email, EmailType::invite_for_role(&role)) {
            let cabinet = self
                .gabinete(&gabinete_id)
                .await
                .map(|g| g.display_name().to_string())
                .unwrap_or_default();
            let vars: Variaveis = vec![
                ("name", name.unwrap_or("").to_string()),
                ("institution", cabinet.clone()),
                ("cabinet", cabinet),
                ("link", action_link.clone()),
            ];
            if let Err(e) = sender.enviar(tipo, &email, &vars).await {
                warn!("⚠️ Convite {} criado, mas o email falhou: {}", invitation.id, e);
            }
        }

        info!("✉️ Convite {} criado para {} ({})", invitation.id, email, role);
        Ok(ConviteCriado {
            invitation,
            action_link,
        })
    }

    pub async fn validar_convite(&self, token: &str) -> AppResult<Convite> {
        let convite: Convite = self
            .db
            .select_one_as(TABELA_CONVITES, &Query::new().eq("token", token.trim()).limit(1))
            .await?
            .ok_or_else(|| AppError::NotFound("Convite não encontrado".to_string()))?;

        match convite.status.as_str() {
            STATUS_ACCEPTED => Err(AppError::Conflict("Convite já foi aceito".to_string())),
            STATUS_CANCELLED => Err(AppError::Gone("Convite cancelado".to_string())),
            _ if convite.expires_at < Utc::now() => Err(AppError::Gone("Convite expirado".to_string())),
            _ => Ok(convite),
        }
    }

    pub async fn aceitar_convite(&self, token: &str, user: &AuthUser) -> AppResult<Convite> {
        let convite = self.validar_convite(token).await?;

        let email_usuario = user.email.as_deref().map(normalize_email).unwrap_or_default();
        if email_usuario != normalize_email(&convite.email) {
            return Err(AppError::Forbidden("Este convite foi enviado para outro email".to_string()));
        }

        self.db
            .insert(
                "gabinete_usuarios",
                json!({
                    "gabinete_id": convite.gabinete_id,
                    "user_id": user.id,
                    "role": convite.role,
                }),
            )
            .await?;

        let atualizados = self
            .db
            .update(
                TABELA_CONVITES,
                &Query::new().eq("id", convite.id.as_str()),
                json!({"status": STATUS_ACCEPTED, "accepted_at": Utc::now().to_rfc3339()}),
            )
            .await?;
        let aceito: Convite = match atualizados.into_iter().next() {
            Some(row) => serde_json::from_value(row)?,
            None => return Err(AppError::InternalError("Convite não pôde ser atualizado".to_string())),
        };

        self.boas_vindas(&aceito, user).await;
        info!("✅ Convite {} aceito por {}", aceito.id, user.id);
        Ok(aceito)
    }

    async fn boas_vindas(&self, convite: &Convite, user: &AuthUser) {
        let (Some(sender), Some(tipo)) = (&self.email, EmailType::welcome_for_role(&convite.role)) else {
            return;
        };

        let perfil: Option<Perfil> = self
            .db
            .select_one_as("profiles", &Query::new().eq("user_id", user.id.as_str()).limit(1))
            .await
            .ok()
            .flatten();
        let name = perfil
            .and_then(|p| p.full_name)
            .or_else(|| convite.name.clone())
            .unwrap_or_else(|| "Usuário".to_string());
        let cabinet = self
            .gabinete(&convite.gabinete_id)
            .await
            .map(|g| g.display_name().to_string())
            .unwrap_or_default();

        let vars: Variaveis = vec![("name", name), ("cabinet", cabinet)];
        if let Err(e) = sender.enviar(tipo, &convite.email, &vars).await {
            warn!("⚠️ Falha ao enviar boas-vindas do convite {}: {}", convite.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingEmail;
    use supabase::MemoryBackend;

    fn service() -> (Arc<MemoryBackend>, Arc<RecordingEmail>, ConvitesService) {
        let db = Arc::new(MemoryBackend::new());
        db.seed("gabinetes", vec![json!({"id": "gab-1", "nome": "Gabinete Vereadora Ana"})]);
        let sender = Arc::new(RecordingEmail::default());
        let email = Arc::new(EmailService::new(db.clone(), sender.clone(), "https://app.legisfy.app.br"));
        (db.clone(), sender, ConvitesService::new(db, Some(email)))
    }

    fn novo(email: &str, role: &str) -> NovoConvite {
        NovoConvite {
            email: email.to_string(),
            name: Some("Bruno".to_string()),
            role: role.to_string(),
            gabinete_id: "gab-1".to_string(),
        }
    }

    fn usuario(email: &str) -> AuthUser {
        AuthUser {
            id: "u-9".to_string(),
            email: Some(email.to_string()),
        }
    }

    #[test]
    fn test_gerar_link() {
        assert_eq!(
            gerar_link("politico", "tok", "a@b.com", "https://app.legisfy.app.br/"),
            "https://app.legisfy.app.br/onboarding?token=tok"
        );
        assert_eq!(
            gerar_link("assessor", "tok", "ana+1@b.com", "https://app"),
            "https://app/aceitar-convite-equipe?token=tok&email=ana%2B1%40b.com&role=assessor"
        );
    }

    #[tokio::test]
    async fn test_criar_convite_envia_email_do_cargo() {
        let (db, sender, service) = service();
        let criado = service
            .criar_convite(novo(" Bruno@Exemplo.com", "atendente"), "u-1", "https://app")
            .await
            .unwrap();

        assert_eq!(criado.invitation.email, "bruno@exemplo.com");
        assert_eq!(criado.invitation.status, STATUS_PENDING);
        assert!(criado.invitation.expires_at > Utc::now() + Duration::days(6));
        assert!(criado.action_link.contains("role=atendente"));
        assert_eq!(db.rows(TABELA_CONVITES).len(), 1);

        let enviado = &sender.emails()[0];
        assert_eq!(enviado.to, "bruno@exemplo.com");
        assert_eq!(enviado.subject, "Convite: Assessor – Gabinete Vereadora Ana");
    }

    #[tokio::test]
    async fn test_criar_convite_rejeita_cargo_e_duplicado() {
        let (_, _, service) = service();
        assert!(matches!(
            service.criar_convite(novo("x@y.com", "admin"), "u-1", "https://app").await,
            Err(AppError::ValidationError(_))
        ));

        service.criar_convite(novo("x@y.com", "assessor"), "u-1", "https://app").await.unwrap();
        assert!(matches!(
            service.criar_convite(novo("X@Y.com", "assessor"), "u-1", "https://app").await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_validar_convite_estados() {
        let (db, _, service) = service();
        db.seed(
            TABELA_CONVITES,
            vec![
                json!({"id": "c1", "token": "aceito", "email": "a@b.com", "role": "assessor", "gabinete_id": "gab-1", "status": "accepted", "expires_at": "2099-01-01T00:00:00Z"}),
                json!({"id": "c2", "token": "cancelado", "email": "a@b.com", "role": "assessor", "gabinete_id": "gab-1", "status": "cancelled", "expires_at": "2099-01-01T00:00:00Z"}),
                json!({"id": "c3", "token": "vencido", "email": "a@b.com", "role": "assessor", "gabinete_id": "gab-1", "status": "pending", "expires_at": "2020-01-01T00:00:00Z"}),
            ],
        );

        assert!(matches!(service.validar_convite("nada").await, Err(AppError::NotFound(_))));
        assert!(matches!(service.validar_convite("aceito").await, Err(AppError::Conflict(_))));
        assert!(matches!(service.validar_convite("cancelado").await, Err(AppError::Gone(_))));
        assert!(matches!(service.validar_convite("vencido").await, Err(AppError::Gone(_))));
    }

    #[tokio::test]
    async fn test_aceitar_convite() {
        let (db, sender, service) = service();
        let criado = service
            .criar_convite(novo("bruno@exemplo.com", "chefe_gabinete"), "u-1", "https://app")
            .await
            .unwrap();
        let token = criado.invitation.token.clone();

        assert!(matches!(
            service.aceitar_convite(&token, &usuario("outro@exemplo.com")).await,
            Err(AppError::Forbidden(_))
        ));

        let aceito = service.aceitar_convite(&token, &usuario("Bruno@exemplo.com")).await.unwrap();
        assert_eq!(aceito.status, STATUS_ACCEPTED);
        assert!(aceito.accepted_at.is_some());

        let membro = &db.rows("gabinete_usuarios")[0];
        assert_eq!(membro["user_id"], "u-9");
        assert_eq!(membro["role"], "chefe_gabinete");

        let emails = sender.emails();
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[1].subject, "Conta ativada como Chefe de Gabinete – Legisfy");
        assert!(matches!(
            service.aceitar_convite(&token, &usuario("bruno@exemplo.com")).await,
            Err(AppError::Conflict(_))
        ));
    }
}
