//! Telegram Bot API: tipos de update e envio de mensagens

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::{MensageriaError, Result};
use crate::ChatSender;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub edited_message: Option<Message>,
}

impl Update {
    /// `message`, ou `edited_message` quando ausente
    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref().or(self.edited_message.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone)]
pub struct TelegramClient {
    http_client: HttpClient,
    base_url: String,
    bot_token: String,
}

impl TelegramClient {
    pub fn new(bot_token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(bot_token, "https://api.telegram.org")
    }

    pub fn with_base_url(bot_token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let bot_token = bot_token.into();
        if bot_token.trim().is_empty() {
            return Err(MensageriaError::ConfigError("TELEGRAM_BOT_TOKEN não configurado".to_string()));
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| MensageriaError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bot_token,
        })
    }

    /// Envia texto com `parse_mode: HTML`
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        tracing::debug!("📤 Enviando mensagem Telegram para {}", chat_id);

        let response = self
            .http_client
            .post(&url)
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!("❌ Telegram API error ({}): {}", status.as_u16(), body);

        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|json| json.get("description").and_then(|d| d.as_str()).map(str::to_string))
            .unwrap_or(body);

        Err(MensageriaError::ApiError {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ChatSender for TelegramClient {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        let chat_id: i64 = chat_id
            .parse()
            .map_err(|_| MensageriaError::ConfigError(format!("chat_id inválido: {}", chat_id)))?;
        self.send_message(chat_id, text).await
    }
}
