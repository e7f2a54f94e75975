//! Tipos de erro para o crate supabase

use thiserror::Error;

/// Erros do cliente Supabase
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// Erro de requisição HTTP
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Erro devolvido pelo PostgREST/Storage/Auth (status code não-2xx)
    #[error("Supabase API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Token de usuário inválido ou expirado
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Erro de parsing JSON
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Registro esperado não encontrado
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Erro de configuração
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Tipo Result padrão para o crate
pub type Result<T> = std::result::Result<T, SupabaseError>;
