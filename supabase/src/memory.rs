//! Backend em memória
//!
//! Implementa os mesmos traits do `SupabaseClient` avaliando as `Query`
//! localmente. Usado nos testes e quando o serviço sobe sem `SUPABASE_URL`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use crate::backend::{AuthBackend, AuthUser, StorageBackend, TableBackend};
use crate::error::{Result, SupabaseError};
use crate::query::Query;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Vec<Value>>>,
    objects: RwLock<HashMap<String, StoredObject>>,
    users: RwLock<HashMap<String, AuthUser>>,
    last_timestamp: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insere linhas como estão, sem preencher `id`/`created_at`
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.entry(table.to_string()).or_default().extend(rows);
    }

    /// Snapshot de uma tabela, na ordem de inserção
    pub fn rows(&self, table: &str) -> Vec<Value> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        tables.get(table).cloned().unwrap_or_default()
    }

    pub fn register_user(&self, token: impl Into<String>, user: AuthUser) {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users.insert(token.into(), user);
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        objects.get(&object_key(bucket, path)).cloned()
    }

    /// Timestamps estritamente crescentes, para ordenação determinística
    fn next_timestamp(&self) -> DateTime<Utc> {
        let mut last = self.last_timestamp.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();
        let next = match *last {
            Some(previous) if now <= previous => previous + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }

    fn prepare_insert(&self, row: Value) -> Result<Map<String, Value>> {
        let Value::Object(mut object) = row else {
            return Err(SupabaseError::ApiError {
                status: 400,
                message: "linha deve ser um objeto JSON".to_string(),
            });
        };

        if !object.get("id").is_some_and(|v| !v.is_null()) {
            object.insert("id".to_string(), Value::String(uuid::Uuid::new_v4().to_string()));
        }
        if !object.get("created_at").is_some_and(|v| !v.is_null()) {
            object.insert("created_at".to_string(), Value::String(self.next_timestamp().to_rfc3339()));
        }
        Ok(object)
    }
}

fn object_key(bucket: &str, path: &str) -> String {
    format!("{}/{}", bucket, path)
}

fn merge(target: &mut Value, patch: &Value) {
    if let (Value::Object(target), Value::Object(patch)) = (target, patch) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[async_trait]
impl TableBackend for MemoryBackend {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        Ok(tables.get(table).map(|rows| query.apply(rows)).unwrap_or_default())
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let object = self.prepare_insert(row)?;
        let row = Value::Object(object);

        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.entry(table.to_string()).or_default().push(row.clone());
        Ok(row)
    }

    async fn upsert(&self, table: &str, row: Value, on_conflict: &str) -> Result<Value> {
        let columns: Vec<&str> = on_conflict
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();

        {
            let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
            let rows = tables.entry(table.to_string()).or_default();
            let existing = rows.iter_mut().find(|existing| {
                !columns.is_empty()
                    && columns
                        .iter()
                        .all(|column| existing.get(*column) == row.get(*column))
            });

            if let Some(existing) = existing {
                merge(existing, &row);
                return Ok(existing.clone());
            }
        }

        self.insert(table, row).await
    }

    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<Vec<Value>> {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let Some(rows) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|row| query.matches(row)) {
            merge(row, &patch);
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<usize> {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };

        let before = rows.len();
        rows.retain(|row| !query.matches(row));
        Ok(before - rows.len())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<()> {
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        let key = object_key(bucket, path);

        if !upsert && objects.contains_key(&key) {
            return Err(SupabaseError::ApiError {
                status: 409,
                message: "The resource already exists".to_string(),
            });
        }

        objects.insert(
            key,
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("http://memory.local/storage/v1/object/public/{}/{}", bucket, path)
    }
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn get_user(&self, jwt: &str) -> Result<AuthUser> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        users
            .get(jwt)
            .cloned()
            .ok_or_else(|| SupabaseError::AuthError("invalid JWT".to_string()))
    }
}
