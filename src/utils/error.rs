use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ia_service::IaServiceError;
use mensageria::MensageriaError;
use serde_json::json;
use std::fmt;
use supabase::SupabaseError;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    /// Recurso existiu mas não é mais utilizável (convite expirado)
    Gone(String),
    UpstreamError(String),
    ServiceUnavailable(String),
    ConfigError(String),
    JsonError(serde_json::Error),
    HttpError(reqwest::Error),
    InternalError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::JsonError(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Gone(_) => StatusCode::GONE,
            AppError::UpstreamError(_) | AppError::HttpError(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ConfigError(_) | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Mensagem sem o prefixo do `Display`, usada no corpo da resposta
    pub fn message(&self) -> String {
        match self {
            AppError::ValidationError(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Gone(msg)
            | AppError::UpstreamError(msg)
            | AppError::ServiceUnavailable(msg)
            | AppError::ConfigError(msg)
            | AppError::InternalError(msg) => msg.clone(),
            AppError::JsonError(err) => err.to_string(),
            AppError::HttpError(err) => err.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Gone(msg) => write!(f, "Gone: {}", msg),
            AppError::UpstreamError(msg) => write!(f, "Upstream error: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::JsonError(err) => write!(f, "JSON error: {}", err),
            AppError::HttpError(err) => write!(f, "HTTP error: {}", err),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::JsonError(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::HttpError(err)
    }
}

impl From<SupabaseError> for AppError {
    fn from(err: SupabaseError) -> Self {
        match err {
            SupabaseError::AuthError(msg) => AppError::Unauthorized(msg),
            SupabaseError::NotFound(msg) => AppError::NotFound(msg),
            SupabaseError::ConfigError(msg) => AppError::ConfigError(msg),
            other => AppError::UpstreamError(other.to_string()),
        }
    }
}

impl From<IaServiceError> for AppError {
    fn from(err: IaServiceError) -> Self {
        match err {
            IaServiceError::ConfigError(msg) => AppError::ConfigError(msg),
            other => AppError::UpstreamError(other.to_string()),
        }
    }
}

impl From<MensageriaError> for AppError {
    fn from(err: MensageriaError) -> Self {
        match err {
            MensageriaError::InvalidSignature => AppError::Unauthorized("Invalid webhook signature".to_string()),
            MensageriaError::ConfigError(msg) => AppError::ConfigError(msg),
            other => AppError::UpstreamError(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = self.message();

        let body = json!({
            "error": error_message,
            "status": status.as_u16()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
