//! Acesso ao Supabase do gabinete
//!
//! Este crate expõe três fronteiras assíncronas usadas pelo middleware:
//!
//! - **Tabelas** (`TableBackend`): select/insert/upsert/update/delete via PostgREST
//! - **Storage** (`StorageBackend`): upload de arquivos e URL pública
//! - **Auth** (`AuthBackend`): resolução do usuário a partir do JWT
//!
//! Há duas implementações:
//!
//! - `SupabaseClient`: HTTP real, autenticado com a service role key
//! - `MemoryBackend`: avalia as mesmas `Query` em memória (testes e modo local)
//!
//! # Exemplo Básico
//!
//! ```rust,ignore
//! use supabase::{Query, SupabaseClient, TableBackend};
//!
//! #[tokio::main]
//! async fn main() -> supabase::Result<()> {
//!     let url = std::env::var("SUPABASE_URL").unwrap_or_default();
//!     let key = std::env::var("SUPABASE_SERVICE_ROLE_KEY").unwrap_or_default();
//!     let client = SupabaseClient::new(url, key)?;
//!
//!     let pendentes = client
//!         .select(
//!             "indicacoes",
//!             &Query::new().eq("status", "pendente").order("created_at", false),
//!         )
//!         .await?;
//!
//!     println!("{} indicações pendentes", pendentes.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod client;
pub mod error;
pub mod memory;
pub mod query;

pub use backend::{AuthBackend, AuthUser, StorageBackend, TableBackend, TableBackendExt};
pub use client::SupabaseClient;
pub use error::{Result, SupabaseError};
pub use memory::{MemoryBackend, StoredObject};
pub use query::{Filter, Query};
