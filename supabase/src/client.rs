//! Cliente HTTP para o Supabase (PostgREST, Storage e Auth)

use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

use crate::backend::{AuthBackend, AuthUser, StorageBackend, TableBackend};
use crate::error::{Result, SupabaseError};
use crate::query::Query;

/// Cliente com a service role key
///
/// # Timeouts
///
/// - Total: 30s
/// - Connect: 5s
#[derive(Clone)]
pub struct SupabaseClient {
    http_client: HttpClient,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Result<Self> {
        Self::with_timeouts(base_url, service_key, 30, 5)
    }

    pub fn with_timeouts(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        total_timeout_secs: u64,
        connect_timeout_secs: u64,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(SupabaseError::ConfigError("SUPABASE_URL não configurado".to_string()));
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(total_timeout_secs))
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .build()
            .map_err(|e| SupabaseError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            service_key: service_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
    }

    /// Processa a resposta HTTP e trata erros
    async fn handle_response(&self, response: Response) -> Result<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let status_code = status.as_u16();
        let error_body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());

        tracing::error!("Supabase API error ({}): {}", status_code, error_body);

        // PostgREST usa "message", o Auth usa "msg" ou "error_description"
        let message = serde_json::from_str::<Value>(&error_body)
            .ok()
            .and_then(|json| {
                json.get("message")
                    .or_else(|| json.get("msg"))
                    .or_else(|| json.get("error_description"))
                    .or_else(|| json.get("error"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(error_body);

        Err(SupabaseError::ApiError {
            status: status_code,
            message,
        })
    }

    async fn rows(&self, response: Response) -> Result<Vec<Value>> {
        let response = self.handle_response(response).await?;
        let body: Value = response.json().await?;
        Ok(match body {
            Value::Array(rows) => rows,
            Value::Null => Vec::new(),
            other => vec![other],
        })
    }
}

#[async_trait]
impl TableBackend for SupabaseClient {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let url = self.rest_url(table);
        tracing::debug!("GET {} {:?}", url, query.to_params());

        let response = self
            .authorized(self.http_client.get(&url))
            .query(&query.to_params())
            .send()
            .await?;

        self.rows(response).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let url = self.rest_url(table);
        tracing::debug!("POST {}", url);

        let response = self
            .authorized(self.http_client.post(&url))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        self.rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SupabaseError::NotFound(format!("insert em {} não retornou linha", table)))
    }

    async fn upsert(&self, table: &str, row: Value, on_conflict: &str) -> Result<Value> {
        let url = self.rest_url(table);
        tracing::debug!("POST (upsert) {} on_conflict={}", url, on_conflict);

        let response = self
            .authorized(self.http_client.post(&url))
            .header("Prefer", "return=representation,resolution=merge-duplicates")
            .query(&[("on_conflict", on_conflict)])
            .json(&row)
            .send()
            .await?;

        self.rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SupabaseError::NotFound(format!("upsert em {} não retornou linha", table)))
    }

    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<Vec<Value>> {
        let url = self.rest_url(table);
        tracing::debug!("PATCH {} {:?}", url, query.filter_params());

        let response = self
            .authorized(self.http_client.patch(&url))
            .header("Prefer", "return=representation")
            .query(&query.filter_params())
            .json(&patch)
            .send()
            .await?;

        self.rows(response).await
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<usize> {
        let url = self.rest_url(table);
        tracing::debug!("DELETE {} {:?}", url, query.filter_params());

        let response = self
            .authorized(self.http_client.delete(&url))
            .header("Prefer", "return=representation")
            .query(&query.filter_params())
            .send()
            .await?;

        Ok(self.rows(response).await?.len())
    }
}

#[async_trait]
impl StorageBackend for SupabaseClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<()> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path);
        tracing::debug!("UPLOAD {} ({} bytes)", url, bytes.len());

        let response = self
            .authorized(self.http_client.post(&url))
            .header("Content-Type", content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes)
            .send()
            .await?;

        self.handle_response(response).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        let encoded = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, encoded)
    }
}

#[async_trait]
impl AuthBackend for SupabaseClient {
    async fn get_user(&self, jwt: &str) -> Result<AuthUser> {
        let url = format!("{}/auth/v1/user", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", jwt))
            .send()
            .await?;

        match self.handle_response(response).await {
            Ok(response) => Ok(response.json().await?),
            Err(SupabaseError::ApiError { status, message }) if status == 401 || status == 403 => {
                Err(SupabaseError::AuthError(message))
            }
            Err(e) => Err(e),
        }
    }
}
