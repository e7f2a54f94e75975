pub mod automacao;
pub mod convites;
pub mod documentos;
pub mod eleitores;
pub mod emails;
pub mod health;
pub mod ia;
pub mod indicacoes;
pub mod telegram;
pub mod two_factor;
pub mod whatsapp;

pub use health::{health_check, ready_check};
