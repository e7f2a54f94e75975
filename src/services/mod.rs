pub mod acesso;
pub mod assistente;
pub mod automacao;
pub mod comandos;
pub mod convites;
pub mod documentos;
pub mod eleitores;
pub mod email;
pub mod indicacoes;
pub mod pareamento;
pub mod two_factor;
pub mod webhook_events;
pub mod whatsapp;

pub use acesso::AcessoService;
pub use assistente::AssistenteService;
pub use automacao::AutomacaoService;
pub use comandos::ComandosService;
pub use convites::ConvitesService;
pub use documentos::DocumentosService;
pub use eleitores::EleitoresService;
pub use email::{EmailSender, EmailService, ResendClient};
pub use indicacoes::IndicacoesService;
pub use pareamento::PareamentoService;
pub use two_factor::TwoFactorService;
pub use webhook_events::WebhookEventsService;
pub use whatsapp::WhatsAppService;
