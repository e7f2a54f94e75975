//! Traits de acesso ao backend (tabelas, storage e auth)
//!
//! Os serviços dependem destes traits, nunca do cliente HTTP diretamente,
//! para que o `MemoryBackend` possa substituí-lo em testes e no modo local.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::query::Query;

/// Operações de tabela (PostgREST)
#[async_trait]
pub trait TableBackend: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>>;

    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// Insere ou mescla pelas colunas de conflito (separadas por vírgula)
    async fn upsert(&self, table: &str, row: Value, on_conflict: &str) -> Result<Value>;

    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<Vec<Value>>;

    async fn delete(&self, table: &str, query: &Query) -> Result<usize>;

    async fn select_one(&self, table: &str, query: &Query) -> Result<Option<Value>> {
        let rows = self.select(table, &query.clone().limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    async fn count(&self, table: &str, query: &Query) -> Result<usize> {
        let rows = self.select(table, &query.clone().select("id")).await?;
        Ok(rows.len())
    }
}

/// Helpers tipados sobre qualquer `TableBackend`
#[async_trait]
pub trait TableBackendExt: TableBackend {
    async fn select_as<T>(&self, table: &str, query: &Query) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let rows = self.select(table, query).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(Into::into))
            .collect()
    }

    async fn select_one_as<T>(&self, table: &str, query: &Query) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        match self.select_one(table, query).await? {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    async fn insert_as<T>(&self, table: &str, row: Value) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let inserted = self.insert(table, row).await?;
        Ok(serde_json::from_value(inserted)?)
    }
}

impl<B: TableBackend + ?Sized> TableBackendExt for B {}

/// Storage de arquivos
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<()>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Usuário autenticado resolvido a partir de um JWT
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Validação de tokens de usuário
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn get_user(&self, jwt: &str) -> Result<AuthUser>;
}
