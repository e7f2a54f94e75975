/// Middleware do gabinete
///
/// - Webhooks dos bots do Telegram e do WhatsApp
/// - Interpretador de comandos e assistente de IA
/// - Fluxo das indicações, eleitores, documentos, e-mails e convites
///
/// Banco, storage e auth ficam no Supabase; integrações sem credencial
/// são desligadas e seus endpoints respondem 503.
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use gabinete_middleware::{
    config::{Prompts, Settings},
    routes::build_router,
    services::{EmailSender, ResendClient},
    utils::{logging::*, AppError},
    AppState, Backends, Integracoes,
};
use ia_service::{ChatCompletion, IaService, IaServiceConfig};
use mensageria::{ChatSender, TelegramClient, WhatsAppClient};
use supabase::{MemoryBackend, SupabaseClient};

fn backends(settings: &Settings, is_production: bool) -> Result<Backends, AppError> {
    if settings.supabase_configured() {
        let client = Arc::new(
            SupabaseClient::new(&settings.supabase.url, &settings.supabase.service_role_key)
                .map_err(|e| AppError::ConfigError(format!("Failed to create Supabase client: {}", e)))?,
        );
        log_info(&format!("🗄️ Supabase configurado: {}", settings.supabase.url));
        return Ok(Backends {
            db: client.clone(),
            storage: client.clone(),
            auth: client,
        });
    }

    if is_production {
        return Err(AppError::ConfigError(
            "SUPABASE_URL e SUPABASE_SERVICE_ROLE_KEY são obrigatórios em produção".to_string(),
        ));
    }

    log_warning("⚠️ Supabase não configurado - usando backend em memória (dados não persistem)");
    let memoria = Arc::new(MemoryBackend::new());
    Ok(Backends {
        db: memoria.clone(),
        storage: memoria.clone(),
        auth: memoria,
    })
}

fn integracoes(settings: &Settings) -> Integracoes {
    let ia: Option<Arc<dyn ChatCompletion>> = {
        let config = IaServiceConfig::new(settings.ai.api_key.as_str())
            .with_base_url(settings.ai.base_url.as_str())
            .with_chat_model(settings.ai.chat_model.as_str())
            .with_header("HTTP-Referer", settings.ai.referer.as_str())
            .with_header("X-Title", settings.ai.title.as_str());
        match IaService::new(config) {
            Ok(service) => Some(Arc::new(service) as Arc<dyn ChatCompletion>),
            Err(e) => {
                log_integration_disabled("IA", &e.to_string());
                None
            }
        }
    };

    let telegram: Option<Arc<dyn ChatSender>> =
        match TelegramClient::with_base_url(settings.telegram.bot_token.as_str(), settings.telegram.api_base_url.as_str()) {
            Ok(client) => {
                log_info("✅ Bot do Telegram configurado");
                Some(Arc::new(client) as Arc<dyn ChatSender>)
            }
            Err(e) => {
                log_integration_disabled("Telegram", &e.to_string());
                None
            }
        };

    let whatsapp: Option<Arc<dyn ChatSender>> = match WhatsAppClient::with_base_url(
        settings.whatsapp.access_token.as_str(),
        settings.whatsapp.phone_number_id.as_str(),
        settings.whatsapp.api_base_url.as_str(),
    ) {
        Ok(client) => {
            log_info("✅ WhatsApp Cloud API configurada");
            Some(Arc::new(client) as Arc<dyn ChatSender>)
        }
        Err(e) => {
            log_integration_disabled("WhatsApp", &e.to_string());
            None
        }
    };

    let email: Option<Arc<dyn EmailSender>> = match ResendClient::with_base_url(
        settings.email.resend_api_key.as_str(),
        settings.email.from_email.as_str(),
        settings.email.api_base_url.as_str(),
    ) {
        Ok(client) => {
            log_info("✅ Envio de e-mails configurado");
            Some(Arc::new(client) as Arc<dyn EmailSender>)
        }
        Err(e) => {
            log_integration_disabled("E-mail", &e.message());
            None
        }
    };

    Integracoes {
        ia,
        telegram,
        whatsapp,
        email,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 🔧 Carregar variáveis de ambiente do arquivo .env (se existir)
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,gabinete_middleware=debug")),
        )
        .init();

    if dotenv.is_ok() {
        tracing::info!("✅ Arquivo .env carregado com sucesso");
    } else {
        tracing::debug!("Arquivo .env não encontrado - usando variáveis de ambiente do sistema");
    }

    let settings = Settings::new().map_err(|e| AppError::ConfigError(format!("Failed to load settings: {}", e)))?;

    let rust_env = std::env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string());
    log_config_loaded(&rust_env);

    let prompts = Arc::new(Prompts::load_default()?);
    let backends = backends(&settings, rust_env == "production")?;
    let integracoes = integracoes(&settings);

    if settings.whatsapp.verify_token.trim().is_empty() {
        log_warning("⚠️ WHATSAPP_VERIFY_TOKEN não configurado - verificação do webhook vai falhar");
    }
    if std::env::var("ADMIN_API_KEY").map(|k| k.is_empty()).unwrap_or(true) {
        log_warning("⚠️ ADMIN_API_KEY não configurada - rotas administrativas abertas fora de produção");
    }

    let port = settings.server.port;
    let state = Arc::new(AppState::new(settings, prompts, backends, integracoes));
    let app = build_router(state);

    log_server_startup(port);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    log_server_ready(port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log_info("👋 Servidor encerrado");
    Ok(())
}

/// Signal handler para graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log_error(&format!("Falha ao instalar handler de Ctrl+C: {}", e));
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sinal) => {
                sinal.recv().await;
            }
            Err(e) => {
                log_error(&format!("Falha ao instalar handler de SIGTERM: {}", e));
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log_info("🛑 Ctrl+C recebido, encerrando...");
        },
        _ = terminate => {
            log_info("🛑 SIGTERM recebido, encerrando...");
        }
    }
}
