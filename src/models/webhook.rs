use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Linha de `webhook_events`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default = "status_padrao")]
    pub status_code: u16,
    #[serde(default)]
    pub request: Value,
    #[serde(default)]
    pub response: Value,
}

fn status_padrao() -> u16 {
    200
}

/// Corpo dos endpoints do n8n: `{whatsapp_e164, payload}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PedidoAutomacao {
    #[serde(default)]
    pub whatsapp_e164: String,
    #[serde(default)]
    pub payload: Value,
}

/// Linha de `usuarios_whatsapp`
#[derive(Debug, Clone, Deserialize)]
pub struct UsuarioWhatsApp {
    pub id: String,
    pub gabinete_id: String,
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub cargo: Option<String>,
}

impl UsuarioWhatsApp {
    /// Sem cargo definido vale `assessor`
    pub fn cargo_slug(&self) -> &str {
        self.cargo
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or("assessor")
    }
}
