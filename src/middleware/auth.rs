//! Usuário autenticado pelo JWT do app

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use supabase::AuthUser;

use crate::utils::AppError;
use crate::AppState;

/// Extrai `Authorization: Bearer <jwt>` e valida na API de auth
#[derive(Debug, Clone)]
pub struct UsuarioAutenticado(pub AuthUser);

pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for UsuarioAutenticado {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| AppError::Unauthorized("Token ausente".to_string()))?;

        match state.auth.get_user(token).await {
            Ok(user) => Ok(UsuarioAutenticado(user)),
            Err(e) => {
                tracing::warn!("❌ Token rejeitado: {}", e);
                Err(AppError::Unauthorized("Token inválido ou expirado".to_string()))
            }
        }
    }
}
