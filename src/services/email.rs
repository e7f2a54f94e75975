//! Dispatcher de e-mails transacionais (Resend)
//!
//! Modelos ativos em `email_templates` têm prioridade; sem modelo no banco,
//! ou se a consulta falhar, usa-se o texto embutido no layout padrão.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use supabase::{Query, TableBackend, TableBackendExt};
use tracing::warn;

use crate::models::{EmailRequest, EmailTemplateRow, EmailType, RenderedEmail};
use crate::utils::logging::log_email_sent;
use crate::utils::{AppError, AppResult};

pub const TABELA_TEMPLATES: &str = "email_templates";

/// Envio de um e-mail já renderizado; devolve o id do provedor
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<String>;
}

#[derive(Clone)]
pub struct ResendClient {
    http_client: HttpClient,
    base_url: String,
    api_key: String,
    from_email: String,
}

impl ResendClient {
    pub fn new(api_key: impl Into<String>, from_email: impl Into<String>) -> AppResult<Self> {
        Self::with_base_url(api_key, from_email, "https://api.resend.com")
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        from_email: impl Into<String>,
        base_url: impl Into<String>,
    ) -> AppResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AppError::ConfigError("RESEND_API_KEY não configurada".to_string()));
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            from_email: from_email.into(),
        })
    }
}

#[async_trait]
impl EmailSender for ResendClient {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<String> {
        let body = json!({
            "from": format!("Legisfy <{}>", self.from_email),
            "to": [to],
            "subject": subject,
            "html": html,
            "reply_to": [format!("Suporte Legisfy <{}>", self.from_email)],
        });

        let response = self
            .http_client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| payload.to_string());
            return Err(AppError::UpstreamError(format!("Resend: {}", message)));
        }

        payload
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::UpstreamError("Falha ao enviar email".to_string()))
    }
}

/// Partes do layout padrão
struct Layout<'a> {
    title: &'a str,
    subtitle: Option<&'a str>,
    body: String,
    button: Option<(&'a str, &'a str)>,
    preheader: Option<String>,
}

fn layout(l: Layout<'_>) -> String {
    let preheader = l
        .preheader
        .map(|p| format!(r#"<div style="display:none;max-height:0;overflow:hidden;font-size:1px;line-height:1px;color:#000000;">{}</div>"#, p))
        .unwrap_or_default();
    let subtitle = l
        .subtitle
        .filter(|s| !s.is_empty())
        .map(|s| format!(r#"<p style="margin:10px 0 0 0;color:rgba(255,255,255,0.40);font-size:14px;line-height:1.4;font-weight:500;">{}</p>"#, s))
        .unwrap_or_default();
    let button = l
        .button
        .filter(|(_, url)| !url.is_empty())
        .map(|(text, url)| {
            format!(
                r#"<table role="presentation" width="100%" cellpadding="0" cellspacing="0" style="margin-top:28px;"><tr><td align="center"><a href="{}" style="display:inline-block;background-color:#ffffff;color:#000000;text-decoration:none;padding:14px 40px;border-radius:10px;font-weight:700;font-size:15px;">{}</a></td></tr></table>"#,
                url, text
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title}</title>
</head>
<body style="margin:0;padding:0;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;background-color:#000000;">
  {preheader}
  <table role="presentation" width="100%" cellpadding="0" cellspacing="0" style="background-color:#000000;padding:40px 20px;">
    <tr><td align="center">
      <table role="presentation" width="560" cellpadding="0" cellspacing="0" style="max-width:560px;width:100%;">
        <tr><td style="background-color:#09090b;border:1px solid rgba(255,255,255,0.05);border-radius:16px;">
          <table role="presentation" width="100%" cellpadding="0" cellspacing="0"><tr>
            <td style="border-bottom:1px solid rgba(255,255,255,0.05);padding:32px 32px 24px 32px;text-align:center;">
              <h1 style="margin:0;color:#ffffff;font-size:24px;font-weight:800;line-height:1.3;">{title}</h1>
              {subtitle}
            </td>
          </tr></table>
          <table role="presentation" width="100%" cellpadding="0" cellspacing="0"><tr>
            <td style="padding:28px 32px;color:rgba(255,255,255,0.50);font-size:15px;line-height:1.7;">
              {body}
              {button}
            </td>
          </tr></table>
          <table role="presentation" width="100%" cellpadding="0" cellspacing="0"><tr>
            <td style="padding:0 32px 24px 32px;"><p style="margin:0;color:rgba(255,255,255,0.25);font-size:11px;line-height:1.5;">Se você não reconhece este convite, ignore este email. Nenhuma ação será tomada automaticamente.</p></td>
          </tr></table>
        </td></tr>
        <tr><td style="padding-top:28px;text-align:center;">
          <p style="margin:0 0 4px 0;color:rgba(255,255,255,0.20);font-size:11px;"><strong>Legisfy</strong> · Plataforma de Gestão Parlamentar</p>
          <p style="margin:0;color:rgba(255,255,255,0.12);font-size:10px;">© 2025 Legisfy. Todos os direitos reservados.</p>
        </td></tr>
      </table>
    </td></tr>
  </table>
</body>
</html>"#,
        title = l.title,
        preheader = preheader,
        subtitle = subtitle,
        body = l.body,
        button = button,
    )
}

/// Variáveis nomeadas de um e-mail
pub type Variaveis = Vec<(&'static str, String)>;

fn var<'a>(vars: &'a [(&'static str, String)], key: &str) -> &'a str {
    vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str()).unwrap_or("")
}

fn saudacao(texto: &str) -> String {
    format!(r#"<h2 style="color:#ffffff;font-size:18px;font-weight:700;margin:0 0 16px 0;">{}</h2>"#, texto)
}

fn paragrafo(texto: &str) -> String {
    format!(r#"<p style="margin:0 0 12px 0;">{}</p>"#, texto)
}

fn destaque(texto: &str) -> String {
    format!(r#"<strong style="color:#ffffff;">{}</strong>"#, texto)
}

/// Texto embutido de cada tipo
pub fn fallback_template(tipo: EmailType, vars: &[(&'static str, String)], app_url: &str) -> RenderedEmail {
    let name = var(vars, "name");
    let cabinet = var(vars, "cabinet");
    let link = var(vars, "link");

    match tipo {
        EmailType::InvitePolitico => {
            let institution = var(vars, "institution");
            RenderedEmail {
                subject: format!(
                    "Convite para criar seu gabinete – {}",
                    if institution.is_empty() { "Legisfy" } else { institution }
                ),
                html: layout(Layout {
                    title: "Você foi autorizado!",
                    subtitle: Some("Crie seu gabinete parlamentar no Legisfy"),
                    body: format!(
                        "{}{}{}",
                        saudacao(&format!("Olá, {}!", name)),
                        paragrafo(&format!("Você foi autorizado a criar seu gabinete na {}.", destaque(institution))),
                        paragrafo("Clique no botão abaixo para iniciar a configuração do seu gabinete.")
                    ),
                    button: Some(("Criar meu Gabinete →", link)),
                    preheader: Some(format!("{}, você foi autorizado a criar seu gabinete", name)),
                }),
            }
        }
        EmailType::WelcomePolitico => RenderedEmail {
            subject: "Gabinete criado com sucesso! – Legisfy".to_string(),
            html: layout(Layout {
                title: "Bem-vindo ao Legisfy!",
                subtitle: Some("Seu gabinete foi criado com sucesso"),
                body: format!(
                    "{}{}",
                    saudacao(&format!("Parabéns, {}!", name)),
                    paragrafo("Seu gabinete parlamentar está pronto para uso. Acesse a plataforma para configurar sua equipe.")
                ),
                button: Some(("Acessar Gabinete →", app_url)),
                preheader: None,
            }),
        },
        EmailType::InviteChefe => RenderedEmail {
            subject: format!("Convite: Chefe de Gabinete – {}", cabinet),
            html: layout(Layout {
                title: "Convite para Chefe de Gabinete",
                subtitle: Some(cabinet),
                body: format!(
                    "{}{}{}",
                    saudacao(&format!("Olá, {}!", name)),
                    paragrafo(&format!(
                        "Você foi convidado(a) para ser {} no gabinete {}.",
                        destaque("Chefe de Gabinete"),
                        destaque(cabinet)
                    )),
                    paragrafo("Clique abaixo para aceitar o convite e criar sua conta.")
                ),
                button: Some(("Aceitar Convite →", link)),
                preheader: None,
            }),
        },
        EmailType::WelcomeChefe => RenderedEmail {
            subject: "Conta ativada como Chefe de Gabinete – Legisfy".to_string(),
            html: layout(Layout {
                title: "Conta Ativada!",
                subtitle: Some("Você agora é Chefe de Gabinete"),
                body: format!(
                    "{}{}",
                    saudacao(&format!("Bem-vindo(a), {}!", name)),
                    paragrafo("Sua conta como Chefe de Gabinete foi ativada com sucesso.")
                ),
                button: Some(("Acessar Plataforma →", app_url)),
                preheader: None,
            }),
        },
        EmailType::InviteAssessor => {
            let ola = if name.is_empty() { "Olá!".to_string() } else { format!("Olá, {}!", name) };
            RenderedEmail {
                subject: format!("Convite: Assessor – {}", cabinet),
                html: layout(Layout {
                    title: "Convite para Assessor",
                    subtitle: Some(cabinet),
                    body: format!(
                        "{}{}{}",
                        saudacao(&ola),
                        paragrafo(&format!(
                            "Você foi convidado(a) para integrar a equipe como {} no gabinete {}.",
                            destaque("Assessor"),
                            destaque(cabinet)
                        )),
                        paragrafo("Clique abaixo para aceitar o convite e criar sua conta.")
                    ),
                    button: Some(("Aceitar Convite →", link)),
                    preheader: None,
                }),
            }
        }
        EmailType::WelcomeAssessor => RenderedEmail {
            subject: "Conta criada como Assessor – Legisfy".to_string(),
            html: layout(Layout {
                title: "Conta Criada!",
                subtitle: Some("Você agora faz parte da equipe"),
                body: format!(
                    "{}{}",
                    saudacao(&format!("Bem-vindo(a), {}!", name)),
                    paragrafo(&format!("Sua conta como Assessor no gabinete {} foi criada.", destaque(cabinet)))
                ),
                button: Some(("Acessar Plataforma →", app_url)),
                preheader: None,
            }),
        },
        EmailType::TwoFactorCode => {
            let code = var(vars, "code");
            RenderedEmail {
                subject: "Seu código de autenticação - Legisfy".to_string(),
                html: layout(Layout {
                    title: "Código de Autenticação",
                    subtitle: Some("Use o código abaixo para completar seu login"),
                    body: format!(
                        r#"<div style="background-color:#ffffff;color:#000000;font-size:32px;font-weight:bold;letter-spacing:4px;padding:20px;border-radius:8px;margin:20px 0;text-align:center;font-family:monospace;">{}</div>{}{}"#,
                        code,
                        paragrafo("⚠️ Este código expira em 5 minutos"),
                        paragrafo("Se você não solicitou este código, ignore este email.")
                    ),
                    button: None,
                    preheader: Some(format!("Seu código: {}", code)),
                }),
            }
        }
    }
}

/// Substitui `{{chave}}` no assunto e no HTML
pub fn aplicar_variaveis(row: &EmailTemplateRow, vars: &[(&'static str, String)]) -> RenderedEmail {
    let substituir = |texto: &str| {
        vars.iter()
            .fold(texto.to_string(), |acc, (k, v)| acc.replace(&format!("{{{{{}}}}}", k), v))
    };
    RenderedEmail {
        subject: substituir(&row.subject),
        html: substituir(&row.html_content),
    }
}

fn campo(valor: &Option<String>) -> Option<String> {
    valor.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Valida o pedido de `POST /emails` e monta as variáveis do tipo
pub fn validar_pedido(request: &EmailRequest) -> AppResult<(EmailType, String, Variaveis)> {
    let (Some(tipo), Some(email)) = (campo(&request.email_type), campo(&request.email)) else {
        return Err(AppError::ValidationError("Campos obrigatórios: type e email".to_string()));
    };

    let tipo = match EmailType::parse(&tipo) {
        Some(EmailType::TwoFactorCode) | None => {
            return Err(AppError::ValidationError(format!("Tipo não suportado: {}", tipo)))
        }
        Some(t) => t,
    };

    let name = campo(&request.name);
    let institution = campo(&request.institution);
    let cabinet = campo(&request.cabinet);
    let link = campo(&request.link);

    let exigir = |ok: bool, campos: &str| {
        if ok {
            Ok(())
        } else {
            Err(AppError::ValidationError(campos.to_string()))
        }
    };

    let vars: Variaveis = match tipo {
        EmailType::InvitePolitico => {
            exigir(name.is_some() && institution.is_some() && link.is_some(), "Campos: name, institution, link")?;
            vec![
                ("name", name.unwrap_or_default()),
                ("institution", institution.unwrap_or_default()),
                ("link", link.unwrap_or_default()),
            ]
        }
        EmailType::WelcomePolitico | EmailType::WelcomeAssessor => {
            exigir(name.is_some() && cabinet.is_some(), "Campos: name, cabinet")?;
            vec![("name", name.unwrap_or_default()), ("cabinet", cabinet.unwrap_or_default())]
        }
        EmailType::InviteChefe => {
            exigir(name.is_some() && cabinet.is_some() && link.is_some(), "Campos: name, cabinet, link")?;
            vec![
                ("name", name.unwrap_or_default()),
                ("cabinet", cabinet.unwrap_or_default()),
                ("link", link.unwrap_or_default()),
            ]
        }
        EmailType::WelcomeChefe => {
            exigir(name.is_some(), "Campo: name")?;
            vec![("name", name.unwrap_or_default()), ("cabinet", cabinet.unwrap_or_default())]
        }
        EmailType::InviteAssessor => {
            exigir(cabinet.is_some() && link.is_some(), "Campos: cabinet, link")?;
            vec![
                ("cabinet", cabinet.unwrap_or_default()),
                ("link", link.unwrap_or_default()),
                ("name", name.unwrap_or_default()),
            ]
        }
        EmailType::TwoFactorCode => Vec::new(),
    };

    Ok((tipo, email, vars))
}

pub struct EmailService {
    db: Arc<dyn TableBackend>,
    sender: Arc<dyn EmailSender>,
    app_url: String,
}

impl EmailService {
    pub fn new(db: Arc<dyn TableBackend>, sender: Arc<dyn EmailSender>, app_url: impl Into<String>) -> Self {
        Self {
            db,
            sender,
            app_url: app_url.into(),
        }
    }

    pub async fn renderizar(&self, tipo: EmailType, vars: &[(&'static str, String)]) -> RenderedEmail {
        let query = Query::new()
            .eq("type", tipo.as_str())
            .eq("is_active", true)
            .order("created_at", false)
            .limit(1);

        match self.db.select_one_as::<EmailTemplateRow>(TABELA_TEMPLATES, &query).await {
            Ok(Some(row)) => aplicar_variaveis(&row, vars),
            Ok(None) => fallback_template(tipo, vars, &self.app_url),
            Err(e) => {
                warn!("⚠️ Falha ao buscar template de email {}: {}", tipo, e);
                fallback_template(tipo, vars, &self.app_url)
            }
        }
    }

    /// Renderiza e envia; devolve o id do provedor
    pub async fn enviar(&self, tipo: EmailType, to: &str, vars: &[(&'static str, String)]) -> AppResult<String> {
        let email = self.renderizar(tipo, vars).await;
        let id = self.sender.send(to, &email.subject, &email.html).await?;
        log_email_sent(tipo.as_str(), &id);
        Ok(id)
    }

    pub async fn despachar(&self, request: &EmailRequest) -> AppResult<Value> {
        let (tipo, email, vars) = validar_pedido(request)?;
        let id = self.enviar(tipo, &email, &vars).await?;
        Ok(json!({
            "success": true,
            "type": tipo.as_str(),
            "emailId": id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingEmail;
    use httpmock::prelude::*;
    use supabase::MemoryBackend;

    fn pedido(tipo: &str) -> EmailRequest {
        EmailRequest {
            email_type: Some(tipo.to_string()),
            email: Some("ana@exemplo.com".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_validar_pedido_campos() {
        let erro = validar_pedido(&EmailRequest::default()).unwrap_err();
        assert_eq!(erro.message(), "Campos obrigatórios: type e email");

        let erro = validar_pedido(&pedido("newsletter")).unwrap_err();
        assert_eq!(erro.message(), "Tipo não suportado: newsletter");

        let erro = validar_pedido(&pedido("invite_chefe")).unwrap_err();
        assert_eq!(erro.message(), "Campos: name, cabinet, link");

        let mut ok = pedido("invite_assessor");
        ok.cabinet = Some("Gabinete Ana".to_string());
        ok.link = Some("https://app/convite".to_string());
        let (tipo, email, vars) = validar_pedido(&ok).unwrap();
        assert_eq!(tipo, EmailType::InviteAssessor);
        assert_eq!(email, "ana@exemplo.com");
        assert_eq!(var(&vars, "name"), "");
    }

    #[test]
    fn test_fallback_invite_assessor_sem_nome() {
        let vars: Variaveis = vec![("cabinet", "Gabinete Ana".into()), ("link", "https://x/y".into())];
        let email = fallback_template(EmailType::InviteAssessor, &vars, "https://app.legisfy.app.br");
        assert_eq!(email.subject, "Convite: Assessor – Gabinete Ana");
        assert!(email.html.contains("Olá!"));
        assert!(email.html.contains(r#"href="https://x/y""#));
    }

    #[test]
    fn test_aplicar_variaveis() {
        let row = EmailTemplateRow {
            subject: "Olá {{name}}".to_string(),
            html_content: "<p>{{name}} - {{cabinet}} - {{outro}}</p>".to_string(),
        };
        let vars: Variaveis = vec![("name", "Ana".into()), ("cabinet", "Gab".into())];
        let email = aplicar_variaveis(&row, &vars);
        assert_eq!(email.subject, "Olá Ana");
        assert_eq!(email.html, "<p>Ana - Gab - {{outro}}</p>");
    }

    #[tokio::test]
    async fn test_despachar_usa_template_ativo_mais_recente() {
        let db = Arc::new(MemoryBackend::new());
        db.seed(
            TABELA_TEMPLATES,
            vec![
                json!({"type": "welcome_chefe", "is_active": true, "subject": "Antigo", "html_content": "x", "created_at": "2024-01-01T00:00:00Z"}),
                json!({"type": "welcome_chefe", "is_active": true, "subject": "Oi {{name}}", "html_content": "<b>{{name}}</b>", "created_at": "2025-01-01T00:00:00Z"}),
                json!({"type": "welcome_chefe", "is_active": false, "subject": "Inativo", "html_content": "x", "created_at": "2026-01-01T00:00:00Z"}),
            ],
        );
        let sender = Arc::new(RecordingEmail::default());
        let service = EmailService::new(db, sender.clone(), "https://app.legisfy.app.br");

        let mut request = pedido("welcome_chefe");
        request.name = Some("Bruno".to_string());
        let resposta = service.despachar(&request).await.unwrap();

        assert_eq!(resposta, json!({"success": true, "type": "welcome_chefe", "emailId": "email-1"}));
        let enviados = sender.emails();
        assert_eq!(enviados[0].subject, "Oi Bruno");
        assert_eq!(enviados[0].html, "<b>Bruno</b>");
    }

    #[tokio::test]
    async fn test_resend_client_envia() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/emails")
                .header("authorization", "Bearer re_123")
                .json_body_partial(r#"{"from": "Legisfy <time@legisfy.app.br>", "to": ["ana@exemplo.com"], "reply_to": ["Suporte Legisfy <time@legisfy.app.br>"]}"#);
            then.status(200).json_body(json!({"id": "msg_1"}));
        });

        let client = ResendClient::with_base_url("re_123", "time@legisfy.app.br", server.base_url()).unwrap();
        let id = client.send("ana@exemplo.com", "Assunto", "<p>oi</p>").await.unwrap();
        assert_eq!(id, "msg_1");
        mock.assert();
    }

    #[tokio::test]
    async fn test_resend_client_erro_e_chave_vazia() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/emails");
            then.status(422).json_body(json!({"message": "domain not verified"}));
        });

        let client = ResendClient::with_base_url("re_123", "time@legisfy.app.br", server.base_url()).unwrap();
        let erro = client.send("a@b.com", "s", "h").await.unwrap_err();
        assert!(matches!(erro, AppError::UpstreamError(ref m) if m.contains("domain not verified")));

        assert!(matches!(ResendClient::new("  ", "x@y.z"), Err(AppError::ConfigError(_))));
    }
}
