//! Tipos de erro para o crate mensageria

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MensageriaError {
    /// Erro de requisição HTTP
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Resposta não-2xx da plataforma
    #[error("Messaging API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Erro de parsing JSON
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Erro de configuração
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Assinatura do webhook ausente ou inválida
    #[error("Invalid webhook signature")]
    InvalidSignature,
}

pub type Result<T> = std::result::Result<T, MensageriaError>;
