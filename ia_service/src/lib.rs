//! Serviço de IA do gabinete
//!
//! Este crate fornece uma interface única para chat completions compatíveis
//! com a API da OpenAI (OpenAI direto ou OpenRouter):
//! - Assessor IA (conversa com histórico)
//! - Interpretação de comandos do WhatsApp/Telegram (resposta JSON)
//! - Análise de modelos de PDF e redação de justificativas
//!
//! E utilitários locais para extração de texto de PDFs (módulo [`pdf`]).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error;
use std::fmt;
use std::time::Duration;

pub mod pdf;

/// Erros do serviço de IA
#[derive(Debug)]
pub enum IaServiceError {
    ApiError(String),
    /// 429 persistente após todas as tentativas
    RateLimited(String),
    DownloadError(String),
    ParseError(String),
    ConfigError(String),
    PdfError(String),
}

impl fmt::Display for IaServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IaServiceError::ApiError(msg) => write!(f, "AI API error: {}", msg),
            IaServiceError::RateLimited(msg) => write!(f, "Rate limited: {}", msg),
            IaServiceError::DownloadError(msg) => write!(f, "Download error: {}", msg),
            IaServiceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            IaServiceError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            IaServiceError::PdfError(msg) => write!(f, "PDF error: {}", msg),
        }
    }
}

impl Error for IaServiceError {}

pub type IaResult<T> = Result<T, IaServiceError>;

/// Mensagem no formato chat completions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Requisição de completion; campos `None` usam a configuração do serviço
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Configuração do serviço de IA
#[derive(Clone)]
pub struct IaServiceConfig {
    /// API key (OpenAI ou OpenRouter)
    pub api_key: String,
    /// URL base da API (padrão: https://openrouter.ai/api/v1)
    pub base_url: String,
    /// Modelo padrão (padrão: openai/gpt-4o-mini)
    pub chat_model: String,
    /// Temperatura padrão (padrão: 0.3)
    pub temperature: f32,
    /// Max tokens padrão (padrão: 1000)
    pub max_tokens: u32,
    /// Tentativas por requisição (padrão: 3)
    pub max_attempts: u32,
    /// Espera base para 429; a n-ésima tentativa espera n × este valor (padrão: 2s)
    pub rate_limit_backoff: Duration,
    /// Espera após erro de transporte (padrão: 1s)
    pub retry_delay: Duration,
    /// Timeout total das requisições em segundos (padrão: 60)
    pub timeout_secs: u64,
    /// Headers extras (ex: HTTP-Referer e X-Title do OpenRouter)
    pub extra_headers: Vec<(String, String)>,
}

impl IaServiceConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            chat_model: "openai/gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            max_attempts: 3,
            rate_limit_backoff: Duration::from_millis(2000),
            retry_delay: Duration::from_millis(1000),
            timeout_secs: 60,
            extra_headers: Vec::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, rate_limit_backoff: Duration, retry_delay: Duration) -> Self {
        self.rate_limit_backoff = rate_limit_backoff;
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }
}

/// Fronteira usada pelos serviços do middleware
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Retorna o conteúdo de `choices[0].message.content`
    async fn complete(&self, request: ChatRequest) -> IaResult<String>;
}

/// Serviço principal de IA
#[derive(Clone)]
pub struct IaService {
    config: IaServiceConfig,
    http_client: reqwest::Client,
}

enum AttemptError {
    RateLimited(String),
    Retryable(IaServiceError),
    Fatal(IaServiceError),
}

impl IaService {
    /// Cria novo serviço de IA
    pub fn new(config: IaServiceConfig) -> IaResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(IaServiceError::ConfigError("API key não configurada".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| IaServiceError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!("✅ IaService inicializado com modelo: {}", config.chat_model);

        Ok(Self { config, http_client })
    }

    /// Obtém informações sobre a configuração atual
    pub fn get_config(&self) -> &IaServiceConfig {
        &self.config
    }

    fn build_payload(&self, request: &ChatRequest) -> Value {
        json!({
            "model": request.model.as_deref().unwrap_or(&self.config.chat_model),
            "messages": request.messages,
            "temperature": request.temperature.unwrap_or(self.config.temperature),
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
        })
    }

    async fn attempt(&self, payload: &Value) -> Result<String, AttemptError> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let mut builder = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(payload);
        for (name, value) in &self.config.extra_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(IaServiceError::ApiError(format!("Request failed: {}", e))))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::RateLimited(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("❌ AI API error (status {}): {}", status.as_u16(), body);
            return Err(AttemptError::Retryable(IaServiceError::ApiError(format!(
                "status {}: {}",
                status.as_u16(),
                body
            ))));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AttemptError::Retryable(IaServiceError::ParseError(format!("Invalid JSON: {}", e))))?;

        if let Some(error) = body.get("error") {
            let code = error.get("code").and_then(|c| c.as_i64().or_else(|| c.as_str()?.parse().ok()));
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string();
            if code == Some(429) {
                return Err(AttemptError::RateLimited(message));
            }
            return Err(AttemptError::Fatal(IaServiceError::ApiError(message)));
        }

        body.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| AttemptError::Fatal(IaServiceError::ParseError("No content in response".to_string())))
    }

    /// Executa a completion com retry
    ///
    /// - 429 (status ou `error.code`): espera `tentativa × rate_limit_backoff`
    /// - Erro de transporte: espera `retry_delay`
    pub async fn complete(&self, request: ChatRequest) -> IaResult<String> {
        let payload = self.build_payload(&request);
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = IaServiceError::ApiError("nenhuma tentativa executada".to_string());

        for attempt in 1..=max_attempts {
            tracing::debug!("🤖 Chat completion tentativa {}/{} ({})", attempt, max_attempts, payload["model"]);

            match self.attempt(&payload).await {
                Ok(content) => return Ok(content),
                Err(AttemptError::RateLimited(message)) => {
                    tracing::warn!("⏳ Rate limit na tentativa {}: {}", attempt, message);
                    last_error = IaServiceError::RateLimited(message);
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.rate_limit_backoff * attempt).await;
                    }
                }
                Err(AttemptError::Retryable(error)) => {
                    tracing::warn!("⚠️ Falha na tentativa {}: {}", attempt, error);
                    last_error = error;
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
                Err(AttemptError::Fatal(error)) => return Err(error),
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl ChatCompletion for IaService {
    async fn complete(&self, request: ChatRequest) -> IaResult<String> {
        IaService::complete(self, request).await
    }
}

/// Teto de download para modelos e fotos (20 MB)
pub const MAX_DOWNLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Baixa um arquivo e falha em respostas não-2xx ou acima de `MAX_DOWNLOAD_BYTES`
pub async fn download_bytes(http_client: &reqwest::Client, url: &str) -> IaResult<Vec<u8>> {
    download_bytes_limited(http_client, url, MAX_DOWNLOAD_BYTES).await
}

pub async fn download_bytes_limited(http_client: &reqwest::Client, url: &str, max_bytes: usize) -> IaResult<Vec<u8>> {
    tracing::info!("⬇️ Baixando arquivo de: {}", url);

    let mut response = http_client
        .get(url)
        .send()
        .await
        .map_err(|e| IaServiceError::DownloadError(format!("Download failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(IaServiceError::DownloadError(format!(
            "HTTP {} while downloading {}",
            response.status(),
            url
        )));
    }

    let muito_grande = || IaServiceError::DownloadError(format!("File exceeds {} bytes: {}", max_bytes, url));

    if response.content_length().is_some_and(|len| len > max_bytes as u64) {
        return Err(muito_grande());
    }

    // Content-Length pode faltar; o limite vale também durante a leitura
    let mut bytes: Vec<u8> = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| IaServiceError::DownloadError(format!("Failed to read bytes: {}", e)))?
    {
        if bytes.len() + chunk.len() > max_bytes {
            return Err(muito_grande());
        }
        bytes.extend_from_slice(&chunk);
    }

    tracing::info!("✅ Arquivo baixado: {} bytes", bytes.len());

    Ok(bytes)
}

/// Remove cercas markdown (```json ... ```) de uma resposta
pub fn strip_json_fences(text: &str) -> String {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```JSON"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let without_close = without_open.trim_end().strip_suffix("```").unwrap_or(without_open);
    without_close.trim().to_string()
}

/// Faz o parse de uma resposta JSON, tolerando cercas markdown
pub fn parse_json_response<T: DeserializeOwned>(text: &str) -> IaResult<T> {
    let cleaned = strip_json_fences(text);
    serde_json::from_str(&cleaned).map_err(|e| {
        IaServiceError::ParseError(format!("Failed to parse JSON: {}. Content: {}", e, cleaned))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn fast_config(server: &MockServer) -> IaServiceConfig {
        IaServiceConfig::new("test-key")
            .with_base_url(server.base_url())
            .with_backoff(Duration::from_millis(1), Duration::from_millis(1))
    }

    #[test]
    fn test_config_builder() {
        let config = IaServiceConfig::new("test-key")
            .with_chat_model("openai/gpt-4o")
            .with_temperature(0.5)
            .with_max_tokens(3000)
            .with_max_attempts(0)
            .with_header("X-Title", "Legisfy Assessor IA");

        assert_eq!(config.chat_model, "openai/gpt-4o");
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.max_tokens, 3000);
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.extra_headers.len(), 1);
    }

    #[test]
    fn test_empty_api_key_is_config_error() {
        assert!(matches!(
            IaService::new(IaServiceConfig::new("  ")),
            Err(IaServiceError::ConfigError(_))
        ));
    }

    #[test]
    fn test_strip_json_fences() {
        assert_eq!(strip_json_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_json_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_json_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_json_response() {
        #[derive(Deserialize)]
        struct Parsed {
            action: String,
        }

        let parsed: Parsed = parse_json_response("```json\n{\"action\":\"chat\"}\n```").unwrap();
        assert_eq!(parsed.action, "chat");
        assert!(parse_json_response::<Parsed>("não é json").is_err());
    }

    #[tokio::test]
    async fn test_complete_sends_payload_and_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("Authorization", "Bearer test-key")
                    .header("X-Title", "Legisfy Assessor IA")
                    .json_body_partial(r#"{"model": "openai/gpt-4o-mini", "max_tokens": 1000}"#);
                then.status(200).json_body(json!({
                    "choices": [{"message": {"role": "assistant", "content": "Olá!"}}]
                }));
            })
            .await;

        let service = IaService::new(fast_config(&server).with_header("X-Title", "Legisfy Assessor IA")).unwrap();
        let answer = service
            .complete(ChatRequest::new(vec![ChatMessage::user("oi")]))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(answer, "Olá!");
    }

    #[tokio::test]
    async fn test_persistent_429_returns_rate_limited() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(429).body("slow down");
            })
            .await;

        let service = IaService::new(fast_config(&server)).unwrap();
        let err = service
            .complete(ChatRequest::new(vec![ChatMessage::user("oi")]))
            .await
            .unwrap_err();

        assert!(matches!(err, IaServiceError::RateLimited(_)));
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn test_body_error_code_429_is_rate_limited() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200)
                    .json_body(json!({"error": {"code": 429, "message": "Rate limit exceeded"}}));
            })
            .await;

        let service = IaService::new(fast_config(&server).with_max_attempts(2)).unwrap();
        let err = service
            .complete(ChatRequest::new(vec![ChatMessage::user("oi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, IaServiceError::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_missing_content_is_parse_error() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({"choices": []}));
            })
            .await;

        let service = IaService::new(fast_config(&server)).unwrap();
        let err = service
            .complete(ChatRequest::new(vec![ChatMessage::user("oi")]))
            .await
            .unwrap_err();

        assert!(matches!(err, IaServiceError::ParseError(_)));
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_download_bytes_fails_on_404() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/modelo.pdf");
                then.status(404);
            })
            .await;

        let client = reqwest::Client::new();
        let err = download_bytes(&client, &server.url("/modelo.pdf")).await.unwrap_err();
        assert!(matches!(err, IaServiceError::DownloadError(_)));
    }

    #[tokio::test]
    async fn test_download_bytes_respects_limit() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/foto.jpg");
                then.status(200).body(vec![0u8; 64]);
            })
            .await;

        let client = reqwest::Client::new();
        let url = server.url("/foto.jpg");

        let err = download_bytes_limited(&client, &url, 32).await.unwrap_err();
        assert!(err.to_string().contains("exceeds 32 bytes"));

        let bytes = download_bytes_limited(&client, &url, 64).await.unwrap();
        assert_eq!(bytes.len(), 64);
    }
}
