// Biblioteca do middleware do gabinete
// Expõe módulos para uso em testes e no binário

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

#[cfg(test)]
pub mod test_support;

use ia_service::ChatCompletion;
use mensageria::ChatSender;
use std::sync::Arc;
use supabase::{AuthBackend, StorageBackend, TableBackend};

use config::{Prompts, Settings};
use services::{
    AcessoService, AssistenteService, AutomacaoService, ComandosService, ConvitesService, DocumentosService, EleitoresService, EmailSender,
    EmailService, IndicacoesService, PareamentoService, TwoFactorService, WebhookEventsService, WhatsAppService,
};

/// Banco, storage e auth do backend
pub struct Backends {
    pub db: Arc<dyn TableBackend>,
    pub storage: Arc<dyn StorageBackend>,
    pub auth: Arc<dyn AuthBackend>,
}

/// Integrações externas; `None` quando faltam credenciais
#[derive(Default)]
pub struct Integracoes {
    pub ia: Option<Arc<dyn ChatCompletion>>,
    pub telegram: Option<Arc<dyn ChatSender>>,
    pub whatsapp: Option<Arc<dyn ChatSender>>,
    pub email: Option<Arc<dyn EmailSender>>,
}

// AppState é definido aqui para ser compartilhado
pub struct AppState {
    pub settings: Settings,
    pub auth: Arc<dyn AuthBackend>,
    pub acesso: AcessoService,
    pub telegram: Option<Arc<dyn ChatSender>>,
    pub whatsapp_sender: Option<Arc<dyn ChatSender>>,
    pub email: Option<Arc<EmailService>>,
    pub comandos: Arc<ComandosService>,
    pub pareamento: PareamentoService,
    pub whatsapp: WhatsAppService,
    pub assistente: Option<AssistenteService>,
    pub documentos: DocumentosService,
    pub two_factor: TwoFactorService,
    pub convites: ConvitesService,
    pub indicacoes: IndicacoesService,
    pub eleitores: EleitoresService,
    pub webhook_events: WebhookEventsService,
    pub automacao: AutomacaoService,
}

impl AppState {
    pub fn new(settings: Settings, prompts: Arc<Prompts>, backends: Backends, integracoes: Integracoes) -> Self {
        let Backends { db, storage, auth } = backends;
        let app_url = settings.app.base_url.clone();

        let email = integracoes
            .email
            .map(|sender| Arc::new(EmailService::new(db.clone(), sender, app_url.as_str())));

        let comandos = Arc::new(ComandosService::new(
            db.clone(),
            integracoes.ia.clone(),
            prompts.clone(),
            settings.ai.parser_model.as_str(),
        ));

        let acesso = AcessoService::new(db.clone());
        let webhook_events = WebhookEventsService::new(db.clone());

        let assistente = integracoes.ia.clone().map(|ia| {
            AssistenteService::new(
                db.clone(),
                acesso.clone(),
                ia,
                prompts.clone(),
                settings.ai.chat_model.as_str(),
            )
        });

        let documentos = DocumentosService::new(
            db.clone(),
            storage,
            integracoes.ia,
            reqwest::Client::new(),
            prompts,
            settings.ai.document_model.clone(),
            settings.app.cidade.clone(),
            settings.supabase.storage_bucket.clone(),
        );

        Self {
            pareamento: PareamentoService::new(db.clone(), comandos.clone()),
            whatsapp: WhatsAppService::new(db.clone(), comandos.clone()),
            two_factor: TwoFactorService::new(db.clone(), email.clone(), app_url),
            convites: ConvitesService::new(db.clone(), email.clone()),
            indicacoes: IndicacoesService::new(db.clone()),
            automacao: AutomacaoService::new(db.clone(), webhook_events.clone()),
            eleitores: EleitoresService::new(db),
            webhook_events,
            telegram: integracoes.telegram,
            whatsapp_sender: integracoes.whatsapp,
            auth,
            acesso,
            email,
            comandos,
            assistente,
            documentos,
            settings,
        }
    }
}
