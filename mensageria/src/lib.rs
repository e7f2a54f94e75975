//! Mensageria: Telegram e WhatsApp
//!
//! - [`telegram`]: tipos de `Update` e `TelegramClient` (sendMessage em HTML)
//! - [`whatsapp`]: handshake `hub.*`, assinatura `X-Hub-Signature-256`,
//!   payload do webhook e `WhatsAppClient`
//!
//! Os dois clientes implementam [`ChatSender`], que é a única coisa que os
//! handlers de webhook conhecem.

pub mod error;
pub mod telegram;
pub mod whatsapp;

use async_trait::async_trait;

pub use error::{MensageriaError, Result};
pub use telegram::{TelegramClient, Update};
pub use whatsapp::{
    verify_signature, verify_subscription, IncomingMessage, Verification, WebhookPayload, WhatsAppClient,
};

/// Envio de texto para um chat (id do Telegram ou número do WhatsApp)
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()>;
}
