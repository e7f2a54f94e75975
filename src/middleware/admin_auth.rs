//! Chave administrativa para as chamadas entre serviços
//!
//! Rotas como `POST /emails`, `POST /ia/acoes` e `POST /convites/link` são
//! chamadas por outros serviços do gabinete e exigem o header `X-Admin-Key`.

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub const HEADER_ADMIN_KEY: &str = "X-Admin-Key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decisao {
    Liberado,
    /// Sem `ADMIN_API_KEY` fora de produção
    LiberadoSemChave,
    Negado,
    NaoConfigurado,
}

/// Compara a chave recebida com `ADMIN_API_KEY`
///
/// - chave configurada e igual: liberado
/// - chave configurada e diferente ou ausente: 401
/// - sem chave configurada em desenvolvimento: liberado com aviso
/// - sem chave configurada em produção: 503
pub fn decidir(expected: Option<&str>, provided: Option<&str>, is_production: bool) -> Decisao {
    match (expected.filter(|k| !k.is_empty()), provided) {
        (Some(expected), Some(provided)) if expected == provided => Decisao::Liberado,
        (Some(_), _) => Decisao::Negado,
        (None, _) if is_production => Decisao::NaoConfigurado,
        (None, _) => Decisao::LiberadoSemChave,
    }
}

pub async fn require_admin_key(headers: HeaderMap, request: Request, next: Next) -> Result<Response, Response> {
    let provided_key = headers.get(HEADER_ADMIN_KEY).and_then(|v| v.to_str().ok());
    let expected_key = std::env::var("ADMIN_API_KEY").ok();
    let is_production = std::env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string()) == "production";

    match decidir(expected_key.as_deref(), provided_key, is_production) {
        Decisao::Liberado => {
            tracing::debug!("✅ Acesso administrativo liberado");
            Ok(next.run(request).await)
        }
        Decisao::LiberadoSemChave => {
            tracing::warn!("⚠️  ADMIN_API_KEY não configurada - acesso liberado em desenvolvimento");
            Ok(next.run(request).await)
        }
        Decisao::Negado => {
            tracing::warn!(
                "❌ Acesso administrativo negado - X-Admin-Key inválida ou ausente: {:?}",
                provided_key.map(|_| "<redacted>")
            );
            Err(unauthorized_response())
        }
        Decisao::NaoConfigurado => {
            tracing::error!("🚨 ADMIN_API_KEY não configurada em produção! Acesso bloqueado.");
            Err(service_unavailable_response())
        }
    }
}

fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "Unauthorized",
            "message": "Header X-Admin-Key ausente ou inválido",
            "hint": "Envie o header X-Admin-Key com a chave do serviço"
        })),
    )
        .into_response()
}

fn service_unavailable_response() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": "Service Unavailable",
            "message": "ADMIN_API_KEY não configurada no servidor",
            "hint": "Peça ao administrador para configurar ADMIN_API_KEY"
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chave_correta() {
        assert_eq!(decidir(Some("k-123"), Some("k-123"), true), Decisao::Liberado);
        assert_eq!(decidir(Some("k-123"), Some("k-123"), false), Decisao::Liberado);
    }

    #[test]
    fn test_chave_errada_ou_ausente() {
        assert_eq!(decidir(Some("k-123"), Some("outra"), false), Decisao::Negado);
        assert_eq!(decidir(Some("k-123"), None, false), Decisao::Negado);
    }

    #[test]
    fn test_sem_chave_configurada() {
        assert_eq!(decidir(None, None, false), Decisao::LiberadoSemChave);
        assert_eq!(decidir(Some(""), Some("x"), false), Decisao::LiberadoSemChave);
        assert_eq!(decidir(None, Some("x"), true), Decisao::NaoConfigurado);
    }

    #[tokio::test]
    async fn test_corpo_401() {
        let response = unauthorized_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Unauthorized");
    }
}
