//! WhatsApp Cloud API: verificação do webhook, payloads e envio de texto

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::Sha256;
use std::time::Duration;

use crate::error::{MensageriaError, Result};
use crate::ChatSender;

/// Resultado do handshake `hub.*`
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    Challenge(String),
    Forbidden,
    MissingParams,
}

/// Handshake GET do Meta (`hub.mode`, `hub.verify_token`, `hub.challenge`)
pub fn verify_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    expected_token: &str,
) -> Verification {
    let (Some(mode), Some(token), Some(challenge)) = (
        mode.filter(|v| !v.is_empty()),
        token.filter(|v| !v.is_empty()),
        challenge.filter(|v| !v.is_empty()),
    ) else {
        return Verification::MissingParams;
    };

    if mode == "subscribe" && !expected_token.is_empty() && token == expected_token {
        Verification::Challenge(challenge.to_string())
    } else {
        Verification::Forbidden
    }
}

/// Valida `X-Hub-Signature-256: sha256=<hex>` sobre o corpo bruto
pub fn verify_signature(app_secret: &str, header: Option<&str>, body: &[u8]) -> Result<()> {
    let header = header.ok_or(MensageriaError::InvalidSignature)?;
    let signature = header.strip_prefix("sha256=").unwrap_or(header);

    let mut mac = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes())
        .map_err(|e| MensageriaError::ConfigError(format!("Invalid app secret: {}", e)))?;
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    if !constant_time_eq(signature.to_ascii_lowercase().as_bytes(), expected.as_bytes()) {
        tracing::warn!("⚠️ Assinatura do webhook WhatsApp inválida");
        return Err(MensageriaError::InvalidSignature);
    }

    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messaging_product: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub display_phone_number: Option<String>,
    #[serde(default)]
    pub phone_number_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub wa_id: Option<String>,
    #[serde(default)]
    pub profile: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub from: String,
    pub id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBody {
    pub body: String,
}

impl IncomingMessage {
    pub fn text_body(&self) -> Option<&str> {
        if self.kind != "text" {
            return None;
        }
        self.text.as_ref().map(|text| text.body.as_str())
    }
}

impl WebhookPayload {
    /// Mensagens de texto; o `id` (wamid) identifica reentregas
    pub fn text_messages(&self) -> impl Iterator<Item = &IncomingMessage> + '_ {
        self.entry
            .iter()
            .flat_map(|entry| entry.changes.iter())
            .flat_map(|change| change.value.messages.iter())
            .filter(|message| message.text_body().is_some())
    }
}

#[derive(Clone)]
pub struct WhatsAppClient {
    http_client: HttpClient,
    base_url: String,
    access_token: String,
    phone_number_id: String,
}

impl WhatsAppClient {
    pub fn new(access_token: impl Into<String>, phone_number_id: impl Into<String>) -> Result<Self> {
        Self::with_base_url(access_token, phone_number_id, "https://graph.facebook.com/v19.0")
    }

    pub fn with_base_url(
        access_token: impl Into<String>,
        phone_number_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let access_token = access_token.into();
        let phone_number_id = phone_number_id.into();
        if access_token.trim().is_empty() || phone_number_id.trim().is_empty() {
            return Err(MensageriaError::ConfigError(
                "WHATSAPP_ACCESS_TOKEN/WHATSAPP_PHONE_NUMBER_ID não configurados".to_string(),
            ));
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| MensageriaError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
            phone_number_id,
        })
    }

    pub async fn send_text_message(&self, to: &str, body: &str) -> Result<()> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        tracing::debug!("📤 Enviando mensagem WhatsApp para {}", to);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": "text",
                "text": { "body": body },
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!("❌ WhatsApp API error ({}): {}", status.as_u16(), body);

        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|json| json.pointer("/error/message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or(body);

        Err(MensageriaError::ApiError {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ChatSender for WhatsAppClient {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        self.send_text_message(chat_id, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_verify_subscription() {
        assert_eq!(
            verify_subscription(Some("subscribe"), Some("tok"), Some("123"), "tok"),
            Verification::Challenge("123".to_string())
        );
        assert_eq!(
            verify_subscription(Some("subscribe"), Some("outro"), Some("123"), "tok"),
            Verification::Forbidden
        );
        assert_eq!(
            verify_subscription(Some("unsubscribe"), Some("tok"), Some("123"), "tok"),
            Verification::Forbidden
        );
        assert_eq!(
            verify_subscription(None, Some("tok"), Some("123"), "tok"),
            Verification::MissingParams
        );
    }

    #[test]
    fn test_verify_signature() {
        let body = br#"{"object":"whatsapp_business_account"}"#;
        let header = sign("segredo", body);

        assert!(verify_signature("segredo", Some(&header), body).is_ok());
        assert!(matches!(
            verify_signature("outro", Some(&header), body),
            Err(MensageriaError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature("segredo", None, body),
            Err(MensageriaError::InvalidSignature)
        ));
    }

    #[test]
    fn test_text_messages_skips_non_text() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {"phone_number_id": "555"},
                        "messages": [
                            {"from": "5527999998888", "id": "a", "type": "text", "text": {"body": "ajuda"}},
                            {"from": "5527999998888", "id": "b", "type": "image"}
                        ]
                    }
                }]
            }]
        }))
        .unwrap();

        let messages: Vec<_> = payload
            .text_messages()
            .map(|m| (m.id.as_str(), m.from.as_str(), m.text_body().unwrap_or_default()))
            .collect();
        assert_eq!(messages, vec![("a", "5527999998888", "ajuda")]);
    }

    #[tokio::test]
    async fn test_send_text_message() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/555/messages")
                    .header("Authorization", "Bearer access")
                    .json_body(json!({
                        "messaging_product": "whatsapp",
                        "to": "5527999998888",
                        "type": "text",
                        "text": {"body": "Olá"}
                    }));
                then.status(200).json_body(json!({"messages": [{"id": "wamid"}]}));
            })
            .await;

        let client = WhatsAppClient::with_base_url("access", "555", server.base_url()).unwrap();
        client.send_text("5527999998888", "Olá").await.unwrap();
        mock.assert_async().await;
    }
}
