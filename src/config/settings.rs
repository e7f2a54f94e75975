use serde::{Deserialize, Serialize};
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub supabase: SupabaseSettings,
    #[serde(default)]
    pub ai: AiSettings,
    #[serde(default)]
    pub telegram: TelegramSettings,
    #[serde(default)]
    pub whatsapp: WhatsAppSettings,
    #[serde(default)]
    pub email: EmailSettings,
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub automacao: AutomacaoSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SupabaseSettings {
    /// Vazio = backend em memória (desenvolvimento local)
    pub url: String,
    pub service_role_key: String,
    pub storage_bucket: String,
}

impl Default for SupabaseSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_role_key: String::new(),
            storage_bucket: "uploads".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AiSettings {
    pub api_key: String,
    pub base_url: String,
    /// Modelo do Assessor IA (conversa)
    pub chat_model: String,
    /// Modelo do parser de comandos (precisa de JSON confiável)
    pub parser_model: String,
    /// Modelo de análise de templates e redação de justificativas
    pub document_model: String,
    pub referer: String,
    pub title: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            chat_model: "google/gemini-2.0-flash-lite-preview-02-05:free".to_string(),
            parser_model: "openai/gpt-4o-mini".to_string(),
            document_model: "openai/gpt-4o-mini".to_string(),
            referer: "https://legisfy.app.br".to_string(),
            title: "Legisfy Assessor IA".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub bot_username: String,
    pub api_base_url: String,
    /// Comparado com `X-Telegram-Bot-Api-Secret-Token` quando definido
    pub webhook_secret: Option<String>,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            bot_username: "LegisfyBot".to_string(),
            api_base_url: "https://api.telegram.org".to_string(),
            webhook_secret: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct WhatsAppSettings {
    pub verify_token: String,
    pub app_secret: Option<String>,
    pub access_token: String,
    pub phone_number_id: String,
    pub api_base_url: String,
}

impl Default for WhatsAppSettings {
    fn default() -> Self {
        Self {
            verify_token: String::new(),
            app_secret: None,
            access_token: String::new(),
            phone_number_id: String::new(),
            api_base_url: "https://graph.facebook.com/v19.0".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct EmailSettings {
    pub resend_api_key: String,
    pub from_email: String,
    pub api_base_url: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            resend_api_key: String::new(),
            from_email: "time@legisfy.app.br".to_string(),
            api_base_url: "https://api.resend.com".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AppSettings {
    /// URL pública do app (links de convite, 2FA)
    pub base_url: String,
    /// Cidade usada na data por extenso dos documentos
    pub cidade: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            base_url: "https://app.legisfy.app.br".to_string(),
            cidade: "Vitória".to_string(),
        }
    }
}

/// Endpoints chamados pelo n8n
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AutomacaoSettings {
    /// Comparado com `X-Webhook-Token`; sem valor as rotas respondem 503
    pub webhook_token: Option<String>,
}

/// Variáveis de ambiente conhecidas e a chave que sobrescrevem
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("SUPABASE_URL", "supabase.url"),
    ("SUPABASE_SERVICE_ROLE_KEY", "supabase.service_role_key"),
    ("OPENROUTER_API_KEY", "ai.api_key"),
    ("OPENAI_API_KEY", "ai.api_key"),
    ("TELEGRAM_BOT_TOKEN", "telegram.bot_token"),
    ("TELEGRAM_BOT_USERNAME", "telegram.bot_username"),
    ("TELEGRAM_WEBHOOK_SECRET", "telegram.webhook_secret"),
    ("WHATSAPP_VERIFY_TOKEN", "whatsapp.verify_token"),
    ("WHATSAPP_APP_SECRET", "whatsapp.app_secret"),
    ("WHATSAPP_ACCESS_TOKEN", "whatsapp.access_token"),
    ("WHATSAPP_PHONE_NUMBER_ID", "whatsapp.phone_number_id"),
    ("RESEND_API_KEY", "email.resend_api_key"),
    ("FROM_EMAIL", "email.from_email"),
    ("APP_BASE_URL", "app.base_url"),
    ("APP_N8N_TOKEN", "automacao.webhook_token"),
];

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            // Arquivo de configuração base
            .add_source(File::with_name("config/default").required(false))
            // Arquivo específico do ambiente
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false));

        // OPENAI_API_KEY vem depois de OPENROUTER_API_KEY e tem precedência
        for (var, key) in ENV_OVERRIDES {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    builder = builder.set_override(*key, value)?;
                }
            }
        }

        // Cloud Run define PORT
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            builder = builder.set_override("server.port", port as i64)?;
        }

        builder = builder.add_source(Environment::with_prefix("GABINETE").separator("__"));

        let s = builder.build()?;

        s.try_deserialize()
    }

    /// Backend real quando URL e chave de serviço estão presentes
    pub fn supabase_configured(&self) -> bool {
        !self.supabase.url.trim().is_empty() && !self.supabase.service_role_key.trim().is_empty()
    }
}
