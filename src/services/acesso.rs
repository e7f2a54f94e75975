//! Controle de acesso por gabinete
//!
//! O backend usa a chave de serviço, que ignora o RLS do banco. Toda rota
//! autenticada que recebe um `gabinete_id` (ou carrega uma linha que tem um)
//! passa por aqui antes de ler ou alterar dados.

use std::sync::Arc;
use supabase::{Query, TableBackend, TableBackendExt};

use crate::models::Membro;
use crate::utils::logging::log_warning;
use crate::utils::{AppError, AppResult};

pub const TABELA_MEMBROS: &str = "gabinete_usuarios";

#[derive(Clone)]
pub struct AcessoService {
    db: Arc<dyn TableBackend>,
}

impl AcessoService {
    pub fn new(db: Arc<dyn TableBackend>) -> Self {
        Self { db }
    }

    /// Vínculo do usuário com o gabinete; 403 quando não é membro
    pub async fn exigir_membro(&self, user_id: &str, gabinete_id: &str) -> AppResult<Membro> {
        let gabinete_id = gabinete_id.trim();
        if gabinete_id.is_empty() {
            return Err(AppError::ValidationError("gabinete_id é obrigatório".to_string()));
        }

        let query = Query::new()
            .eq("user_id", user_id)
            .eq("gabinete_id", gabinete_id)
            .limit(1);
        match self.db.select_one_as::<Membro>(TABELA_MEMBROS, &query).await? {
            Some(membro) => Ok(membro),
            None => {
                log_warning(&format!(
                    "🚫 Usuário {} sem acesso ao gabinete {}",
                    user_id, gabinete_id
                ));
                Err(AppError::Forbidden("Sem acesso a este gabinete".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use supabase::MemoryBackend;

    fn service() -> AcessoService {
        let db = Arc::new(MemoryBackend::new());
        db.seed(
            TABELA_MEMBROS,
            vec![json!({"gabinete_id": "gab-1", "user_id": "u1", "role": "assessor"})],
        );
        AcessoService::new(db)
    }

    #[tokio::test]
    async fn test_membro_do_gabinete() {
        let membro = service().exigir_membro("u1", " gab-1 ").await.unwrap();
        assert_eq!(membro.role.as_deref(), Some("assessor"));
    }

    #[tokio::test]
    async fn test_outro_gabinete_e_proibido() {
        let acesso = service();
        assert!(matches!(
            acesso.exigir_membro("u1", "gab-2").await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            acesso.exigir_membro("u2", "gab-1").await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            acesso.exigir_membro("u1", "  ").await,
            Err(AppError::ValidationError(_))
        ));
    }
}
