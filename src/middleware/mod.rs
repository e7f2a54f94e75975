//! Middlewares e extratores de autenticação

pub mod admin_auth;
pub mod auth;
pub mod webhook_token;

pub use admin_auth::require_admin_key;
pub use auth::UsuarioAutenticado;
pub use webhook_token::require_webhook_token;
